//! Splitting the enumerated key list into jobs

use std::num::NonZeroUsize;

/// One contiguous run of keys processed by a single worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Position of this job in partition order
    pub id: usize,

    /// Keys in their original order (never empty)
    pub keys: Vec<String>,
}

/// Invoke `f` once per contiguous chunk of at most `size` items, in order
///
/// Every chunk except possibly the last holds exactly `size` items. An empty
/// input produces no chunks.
pub fn partition<T, F>(items: &[T], size: NonZeroUsize, mut f: F)
where
    F: FnMut(&[T]),
{
    for chunk in items.chunks(size.get()) {
        f(chunk);
    }
}

/// Number of chunks `partition` produces for `len` items
pub fn job_count(len: usize, size: NonZeroUsize) -> usize {
    len.div_ceil(size.get())
}

/// Partition keys into numbered jobs
pub fn jobs(keys: &[String], size: NonZeroUsize) -> Vec<Job> {
    let mut jobs = Vec::with_capacity(job_count(keys.len(), size));
    partition(keys, size, |chunk| {
        jobs.push(Job {
            id: jobs.len(),
            keys: chunk.to_vec(),
        });
    });
    jobs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("k{}", i)).collect()
    }

    #[test]
    fn test_partition_sizes() {
        for n in 0..25 {
            for s in 1..8 {
                let input = keys(n);
                let mut chunks: Vec<Vec<String>> = Vec::new();
                partition(&input, nz(s), |c| chunks.push(c.to_vec()));

                assert_eq!(chunks.len(), job_count(n, nz(s)), "n={} s={}", n, s);
                assert_eq!(chunks.len(), (n + s - 1) / s);
                assert!(chunks.iter().all(|c| !c.is_empty()));
                if let Some((last, rest)) = chunks.split_last() {
                    assert!(rest.iter().all(|c| c.len() == s));
                    assert!(last.len() <= s);
                }
                assert_eq!(chunks.concat(), input);
            }
        }
    }

    #[test]
    fn test_partition_empty() {
        let mut calls = 0;
        partition::<String, _>(&[], nz(3), |_| calls += 1);
        assert_eq!(calls, 0);
        assert_eq!(job_count(0, nz(3)), 0);
    }

    #[test]
    fn test_jobs_numbered_in_order() {
        let input: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let jobs = jobs(&input, nz(2));
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0], Job { id: 0, keys: vec!["a".into(), "b".into()] });
        assert_eq!(jobs[1], Job { id: 1, keys: vec!["c".into()] });
    }
}
