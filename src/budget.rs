//! Buffer budget planning.

use std::error::Error;
use std::fmt;

/// Smallest write buffer the planner will ever hand out.
pub const MIN_WRITE_BUFFER_SIZE: usize = 8 * 1024;
/// Smallest per-source read buffer the planner will ever hand out.
pub const MIN_READ_BUFFER_SIZE: usize = 4 * 1024;

/// Buffer planning error.
#[derive(Debug, PartialEq)]
pub enum BudgetError {
    /// Write/read split ratio is outside the open interval (0, 1).
    InvalidRatio(f64),
    /// Fewer than two sources were supplied.
    TooFewSources(usize),
    /// An explicitly supplied buffer size is beneath its minimum.
    BufferTooSmall { size: usize, min: usize },
    /// The number of explicitly supplied read buffers does not match the source count.
    SourceCountMismatch { buffers: usize, sources: usize },
}

impl Error for BudgetError {}

impl fmt::Display for BudgetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetError::InvalidRatio(ratio) => {
                write!(f, "write/read ratio {} is not within (0, 1)", ratio)
            }
            BudgetError::TooFewSources(count) => {
                write!(f, "at least 2 sources required, got {}", count)
            }
            BudgetError::BufferTooSmall { size, min } => {
                write!(f, "buffer of {} bytes is beneath the {} byte minimum", size, min)
            }
            BudgetError::SourceCountMismatch { buffers, sources } => {
                write!(f, "{} read buffers supplied for {} sources", buffers, sources)
            }
        }
    }
}

/// Buffer sizing strategy. Either a total allowance split proportionally across the
/// sources, or caller-supplied sizes bypassing the planner entirely.
#[derive(Debug, Clone)]
pub enum BufferPlan {
    /// Split `total_bytes` into one write buffer (`write_ratio` share) and per-source
    /// read buffers proportional to each source's byte size.
    Budget { total_bytes: u64, write_ratio: f64 },
    /// Explicit sizes; `read_buffer_sizes` is matched positionally against the sources.
    Explicit {
        write_buffer_size: usize,
        read_buffer_sizes: Vec<usize>,
    },
}

impl Default for BufferPlan {
    fn default() -> Self {
        BufferPlan::Budget {
            total_bytes: 16 * 1024 * 1024,
            write_ratio: 0.5,
        }
    }
}

impl BufferPlan {
    /// Checks everything that can be checked without knowing the source sizes.
    /// Lets configuration mistakes surface before any source file is touched.
    pub fn validate(&self) -> Result<(), BudgetError> {
        match self {
            BufferPlan::Budget { write_ratio, .. } => {
                if !(*write_ratio > 0.0 && *write_ratio < 1.0) {
                    return Err(BudgetError::InvalidRatio(*write_ratio));
                }
            }
            BufferPlan::Explicit {
                write_buffer_size,
                read_buffer_sizes,
            } => {
                check_min(*write_buffer_size, MIN_WRITE_BUFFER_SIZE)?;
                for &size in read_buffer_sizes {
                    check_min(size, MIN_READ_BUFFER_SIZE)?;
                }
            }
        }
        Ok(())
    }

    /// Resolves the plan against the actual source sizes.
    pub fn resolve(&self, source_sizes: &[u64]) -> Result<BufferBudget, BudgetError> {
        match self {
            BufferPlan::Budget { total_bytes, write_ratio } => {
                plan(*total_bytes, *write_ratio, source_sizes)
            }
            BufferPlan::Explicit {
                write_buffer_size,
                read_buffer_sizes,
            } => {
                if source_sizes.len() < 2 {
                    return Err(BudgetError::TooFewSources(source_sizes.len()));
                }
                if read_buffer_sizes.len() != source_sizes.len() {
                    return Err(BudgetError::SourceCountMismatch {
                        buffers: read_buffer_sizes.len(),
                        sources: source_sizes.len(),
                    });
                }
                check_min(*write_buffer_size, MIN_WRITE_BUFFER_SIZE)?;
                for &size in read_buffer_sizes {
                    check_min(size, MIN_READ_BUFFER_SIZE)?;
                }
                Ok(BufferBudget {
                    write_buffer_size: *write_buffer_size,
                    read_buffer_sizes: read_buffer_sizes.clone(),
                })
            }
        }
    }
}

/// Resolved buffer sizes. Computed once per merge call and never resized.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferBudget {
    /// Target write buffer size in bytes.
    pub write_buffer_size: usize,
    /// Read buffer size per source, in source order.
    pub read_buffer_sizes: Vec<usize>,
}

/// Splits a total byte allowance into one write buffer and per-source read buffers
/// proportional to each source's share of the aggregate source size.
///
/// Every size is clamped up to its minimum, so with many tiny sources the sum of the
/// produced sizes may exceed the allowance. The allowance is an approximation, not a
/// hard ceiling.
pub fn plan(total_bytes: u64, write_ratio: f64, source_sizes: &[u64]) -> Result<BufferBudget, BudgetError> {
    if !(write_ratio > 0.0 && write_ratio < 1.0) {
        return Err(BudgetError::InvalidRatio(write_ratio));
    }
    if source_sizes.len() < 2 {
        return Err(BudgetError::TooFewSources(source_sizes.len()));
    }

    let write_buffer_size = ((total_bytes as f64 * write_ratio) as u64).max(MIN_WRITE_BUFFER_SIZE as u64);
    let read_budget = total_bytes
        .saturating_sub(write_buffer_size)
        .max(MIN_READ_BUFFER_SIZE as u64);

    let total_size: u64 = source_sizes.iter().sum();
    let read_buffer_sizes = source_sizes
        .iter()
        .map(|&size| {
            let share = if total_size == 0 {
                0
            } else {
                (read_budget as u128 * size as u128 / total_size as u128) as u64
            };
            share.max(MIN_READ_BUFFER_SIZE as u64) as usize
        })
        .collect();

    Ok(BufferBudget {
        write_buffer_size: write_buffer_size as usize,
        read_buffer_sizes,
    })
}

fn check_min(size: usize, min: usize) -> Result<(), BudgetError> {
    if size < min {
        Err(BudgetError::BufferTooSmall { size, min })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::{plan, BudgetError, BufferPlan, MIN_READ_BUFFER_SIZE, MIN_WRITE_BUFFER_SIZE};

    #[test]
    fn test_proportional_split() {
        let budget = plan(16 * 1024 * 1024, 0.5, &[3 * 1024 * 1024, 1024 * 1024]).unwrap();

        assert_eq!(budget.write_buffer_size, 8 * 1024 * 1024);
        assert_eq!(budget.read_buffer_sizes, vec![6 * 1024 * 1024, 2 * 1024 * 1024]);
    }

    #[test]
    fn test_idempotence() {
        let sizes = [123_456, 7_890_123, 42];

        let first = plan(1024 * 1024, 0.3, &sizes).unwrap();
        let second = plan(1024 * 1024, 0.3, &sizes).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_minimums_enforced() {
        // an allowance far below the minimums still produces usable buffers
        let budget = plan(16, 0.5, &[10, 0, 10_000]).unwrap();

        assert_eq!(budget.write_buffer_size, MIN_WRITE_BUFFER_SIZE);
        for size in budget.read_buffer_sizes {
            assert!(size >= MIN_READ_BUFFER_SIZE);
        }
    }

    #[test]
    fn test_empty_sources_get_minimum() {
        let budget = plan(1024 * 1024, 0.5, &[0, 0]).unwrap();

        assert_eq!(
            budget.read_buffer_sizes,
            vec![MIN_READ_BUFFER_SIZE, MIN_READ_BUFFER_SIZE]
        );
    }

    #[rstest]
    #[case(0.0)]
    #[case(1.0)]
    #[case(-0.1)]
    #[case(1.5)]
    #[case(f64::NAN)]
    fn test_invalid_ratio(#[case] ratio: f64) {
        let result = plan(1024 * 1024, ratio, &[100, 100]);
        assert!(matches!(result, Err(BudgetError::InvalidRatio(_))));
    }

    #[rstest]
    #[case(&[])]
    #[case(&[100])]
    fn test_too_few_sources(#[case] sizes: &[u64]) {
        let result = plan(1024 * 1024, 0.5, sizes);
        assert!(matches!(result, Err(BudgetError::TooFewSources(_))));
    }

    #[test]
    fn test_explicit_plan_validated() {
        let plan = BufferPlan::Explicit {
            write_buffer_size: MIN_WRITE_BUFFER_SIZE,
            read_buffer_sizes: vec![MIN_READ_BUFFER_SIZE, MIN_READ_BUFFER_SIZE - 1],
        };

        let result = plan.resolve(&[100, 100]);
        assert_eq!(
            result,
            Err(BudgetError::BufferTooSmall {
                size: MIN_READ_BUFFER_SIZE - 1,
                min: MIN_READ_BUFFER_SIZE,
            })
        );
    }

    #[test]
    fn test_explicit_plan_count_mismatch() {
        let plan = BufferPlan::Explicit {
            write_buffer_size: MIN_WRITE_BUFFER_SIZE,
            read_buffer_sizes: vec![MIN_READ_BUFFER_SIZE; 3],
        };

        let result = plan.resolve(&[100, 100]);
        assert!(matches!(result, Err(BudgetError::SourceCountMismatch { .. })));
    }
}
