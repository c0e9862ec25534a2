use crate::core::context::CancellationToken;
use crate::core::error::{Error, Result};
use crate::core::stats::IndexingWorkStats;

/// Applies an indexing function item by item; a failing item is reported and skipped.
#[derive(Debug)]
pub struct RobustEnumerator<'a> {
    cancellation: &'a CancellationToken,
    max_items: usize,
}

impl<'a> RobustEnumerator<'a> {
    pub fn new(cancellation: &'a CancellationToken, max_items: usize) -> Self {
        RobustEnumerator { cancellation, max_items }
    }

    /// Processes at most `max_items` items. Only cancellation aborts the run.
    pub fn enumerate<I, T, O, F, E>(
        &self,
        input: I,
        stats: &mut IndexingWorkStats,
        mut func: F,
        mut on_error: E,
    ) -> Result<Vec<O>>
    where
        I: IntoIterator<Item = T>,
        F: FnMut(&T) -> Result<Vec<O>>,
        E: FnMut(&T, &Error),
    {
        let mut output = Vec::new();
        for item in input.into_iter().take(self.max_items) {
            self.cancellation.check()?;
            stats.attempt();
            match func(&item) {
                Ok(produced) => {
                    stats.success();
                    output.extend(produced);
                }
                Err(err) => {
                    stats.error();
                    on_error(&item, &err);
                }
            }
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::stats::WorkOperation;

    fn halve(n: &u32) -> Result<Vec<u32>> {
        if n % 2 == 1 {
            return Err(Error::new(ErrorKind::Internal, format!("{} is odd", n)));
        }
        Ok(vec![n / 2])
    }

    #[test]
    fn failures_are_counted_and_skipped() {
        let token = CancellationToken::new();
        let mut stats = IndexingWorkStats::new(WorkOperation::Map);
        let mut failed = Vec::new();

        let output = RobustEnumerator::new(&token, 100)
            .enumerate(vec![2, 3, 4, 5], &mut stats, halve, |n, _| failed.push(*n))
            .unwrap();

        assert_eq!(output, vec![1, 2]);
        assert_eq!(failed, vec![3, 5]);
        assert_eq!(stats.indexing_attempts, 4);
        assert_eq!(stats.indexing_successes, 2);
        assert_eq!(stats.indexing_errors, 2);
    }

    #[test]
    fn stops_at_the_item_cap_and_on_cancellation() {
        let token = CancellationToken::new();
        let mut stats = IndexingWorkStats::new(WorkOperation::Reduce);
        let output = RobustEnumerator::new(&token, 2)
            .enumerate(vec![2, 4, 6], &mut stats, halve, |_, _| {})
            .unwrap();
        assert_eq!(output, vec![1, 2]);
        assert_eq!(stats.reduce_attempts, 2);

        token.cancel();
        let err = RobustEnumerator::new(&token, 2)
            .enumerate(vec![2], &mut stats, halve, |_, _| {})
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cancelled);
    }
}
