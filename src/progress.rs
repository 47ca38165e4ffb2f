//! Progress reporting for long-running scrapes.
//!
//! The core never talks to the UI or the task registry directly; it
//! pushes (percent, message) pairs into whatever sink the caller hands
//! it. Reports are advisory: not persisted, not retried.

/// Observer for run progress. Percent is 0–100; the message is a
/// human-readable status line.
pub trait ProgressSink {
    fn report(&self, percent: u8, message: &str);
}

/// Discards all reports.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _percent: u8, _message: &str) {}
}

/// Adapts a plain callback into a sink, for callers that just want to
/// pass a closure.
pub struct FnSink<F: Fn(u8, &str)>(pub F);

impl<F: Fn(u8, &str)> ProgressSink for FnSink<F> {
    fn report(&self, percent: u8, message: &str) {
        (self.0)(percent, message)
    }
}

/// Rescales a sub-run's local 0–100 progress into its 1/N slice of a bulk
/// run, prefixing the status with "[Search k/N] ".
pub struct SubSearchSink<'a> {
    inner: &'a dyn ProgressSink,
    index: usize,
    total: usize,
}

impl<'a> SubSearchSink<'a> {
    pub fn new(inner: &'a dyn ProgressSink, index: usize, total: usize) -> Self {
        Self { inner, index, total }
    }
}

impl ProgressSink for SubSearchSink<'_> {
    fn report(&self, percent: u8, message: &str) {
        let overall = (self.index * 100 + percent as usize) / self.total.max(1);
        self.inner.report(
            overall.min(100) as u8,
            &format!("[Search {}/{}] {}", self.index + 1, self.total, message),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture(Mutex<Vec<(u8, String)>>);

    impl ProgressSink for Capture {
        fn report(&self, percent: u8, message: &str) {
            self.0.lock().unwrap().push((percent, message.to_string()));
        }
    }

    #[test]
    fn sub_search_rescales_into_slice() {
        let cap = Capture::default();
        let sub = SubSearchSink::new(&cap, 1, 4);
        sub.report(50, "halfway");
        let got = cap.0.lock().unwrap();
        assert_eq!(got[0].0, 37); // (100 + 50) / 4
        assert_eq!(got[0].1, "[Search 2/4] halfway");
    }

    #[test]
    fn last_slice_completes_at_hundred() {
        let cap = Capture::default();
        let sub = SubSearchSink::new(&cap, 2, 3);
        sub.report(100, "done");
        assert_eq!(cap.0.lock().unwrap()[0].0, 100);
    }

    #[test]
    fn closures_adapt_into_sinks() {
        let sink = FnSink(|percent: u8, message: &str| {
            assert_eq!(percent, 10);
            assert_eq!(message, "x");
        });
        sink.report(10, "x");
    }
}
