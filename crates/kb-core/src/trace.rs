//! Functional trace
//!
//! Errors raised deep inside the builder or the store lose track of the
//! top-level operation. Work is therefore wrapped in "doing X" frames; when
//! an error unwinds through a frame, the frame is prepended to the error's
//! trace so the report reads outermost operation first.

use crate::error::KbError;
use serde::Serialize;
use std::fmt::{self, Display};

/// One "doing X" step with its key data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceFrame {
    /// What was being done, e.g. `posting table`
    pub activity: String,
    /// Relevant values, in insertion order
    pub data: Vec<(String, String)>,
}

impl TraceFrame {
    /// Create a frame with no data
    pub fn new(activity: impl Into<String>) -> Self {
        Self {
            activity: activity.into(),
            data: Vec::new(),
        }
    }

    /// Add a key/value pair
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.data.push((key.into(), value.to_string()));
        self
    }
}

impl Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "while {}", self.activity)?;
        if !self.data.is_empty() {
            let pairs: Vec<String> = self.data.iter().map(|(k, v)| format!("{k}={v}")).collect();
            write!(f, " [{}]", pairs.join(", "))?;
        }
        Ok(())
    }
}

/// Stack of frames for the operation in progress
#[derive(Debug, Clone, Default)]
pub struct FunctionalTrace {
    frames: Vec<TraceFrame>,
}

impl FunctionalTrace {
    /// Create an empty trace
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames currently open, outermost first
    #[must_use]
    pub fn frames(&self) -> &[TraceFrame] {
        &self.frames
    }

    /// Run `f` inside `frame`
    ///
    /// Opens a `tracing` span for the frame. An error returned by `f` gets
    /// the frame prepended to its trace.
    ///
    /// # Errors
    /// Whatever `f` returns
    pub fn doing<T>(
        &mut self,
        frame: TraceFrame,
        f: impl FnOnce(&mut Self) -> Result<T, KbError>,
    ) -> Result<T, KbError> {
        let span = tracing::info_span!("doing", activity = %frame.activity);
        let _entered = span.enter();
        self.frames.push(frame);
        let result = f(self);
        let frame = self.frames.pop();
        result.map_err(|mut err| {
            if let Some(frame) = frame {
                err.trace.insert(0, frame);
            }
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KbErrorKind;

    #[test]
    fn frame_display() {
        let frame = TraceFrame::new("posting table")
            .with("sheet", "Plan")
            .with("rows", 3);
        assert_eq!(frame.to_string(), "while posting table [sheet=Plan, rows=3]");
    }

    #[test]
    fn frames_unwind_outermost_first() {
        let mut trace = FunctionalTrace::new();
        let err = trace
            .doing(TraceFrame::new("outer"), |t| {
                t.doing(TraceFrame::new("inner"), |t| {
                    assert_eq!(t.frames().len(), 2);
                    Err::<(), _>(KbError::from(KbErrorKind::Reference {
                        column: "c".into(),
                        detail: "boom".into(),
                    }))
                })
            })
            .unwrap_err();
        let activities: Vec<&str> = err.trace.iter().map(|f| f.activity.as_str()).collect();
        assert_eq!(activities, vec!["outer", "inner"]);
        assert!(trace.frames().is_empty());
    }

    #[test]
    fn success_leaves_no_frames() {
        let mut trace = FunctionalTrace::new();
        let v = trace.doing(TraceFrame::new("work"), |_| Ok(7)).unwrap();
        assert_eq!(v, 7);
        assert!(trace.frames().is_empty());
    }
}
