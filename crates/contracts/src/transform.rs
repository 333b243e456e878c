//! Transform trait - per-item processing step run by the worker pool

use crate::TransformError;

/// Pure function from the pipeline's point of view: no side effects visible
/// beyond the return value. Shared by every worker, hence `Sync`.
pub trait Transform<In, Out>: Send + Sync {
    fn apply(&self, input: In) -> Result<Out, TransformError>;

    /// Name used in logs and metrics
    fn name(&self) -> &str {
        "transform"
    }
}

impl<In, Out, F> Transform<In, Out> for F
where
    F: Fn(In) -> Result<Out, TransformError> + Send + Sync,
{
    fn apply(&self, input: In) -> Result<Out, TransformError> {
        self(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn double(x: u64) -> Result<u64, TransformError> {
        Ok(x * 2)
    }

    #[test]
    fn test_closure_is_transform() {
        let t: &dyn Transform<u64, u64> = &double;
        assert_eq!(t.apply(21), Ok(42));

        let failing = |_: u64| -> Result<u64, TransformError> { Err(TransformError::new("nope")) };
        assert_eq!(failing.apply(1), Err(TransformError::new("nope")));
    }
}
