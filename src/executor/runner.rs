//! Driving operator trees to completion.
//!
//! [`drain`] pulls every row or batch out of an opened operator tree in the
//! requested [`ExecutionMode`] and hands each one to a sink. [`collect_rows`]
//! wraps it with open/close for callers that just want the result rows.

use tracing::warn;

use crate::chunk::Chunk;
use crate::config::ExecutionMode;
use crate::tx::Transaction;

use super::error::ExecutorError;
use super::operator::PhysicalOperator;
use super::tuple::Tuple;

/// One unit of operator output.
#[derive(Debug, Clone, Copy)]
pub enum Output<'a> {
    /// A row produced in tuple mode.
    Tuple(&'a Tuple),
    /// A non-empty batch produced in chunk mode.
    Chunk(&'a Chunk),
}

/// Fails with [`ExecutorError::Unimplemented`] if some operator of `root`
/// cannot run in `mode`.
pub fn check_mode(root: &PhysicalOperator, mode: ExecutionMode) -> Result<(), ExecutorError> {
    if root.supports(mode) {
        Ok(())
    } else {
        Err(ExecutorError::Unimplemented(format!(
            "{} tree does not support {:?} mode",
            root.name(),
            mode
        )))
    }
}

/// Pulls everything out of an opened `root`, passing each row or non-empty
/// batch to `sink`. Stops at the first error from the tree or the sink.
pub fn drain<F>(root: &mut PhysicalOperator, mode: ExecutionMode, mut sink: F) -> Result<(), ExecutorError>
where
    F: FnMut(Output<'_>) -> Result<(), ExecutorError>,
{
    check_mode(root, mode)?;
    match mode {
        ExecutionMode::Tuple => {
            while root.next()? {
                let tuple = root.current_tuple().ok_or_else(|| {
                    ExecutorError::Internal(format!("{} returned a row without a tuple", root.name()))
                })?;
                sink(Output::Tuple(tuple))?;
            }
        }
        ExecutionMode::Chunk => {
            let mut chunk = Chunk::new();
            while root.next_chunk(&mut chunk)? {
                if !chunk.is_empty() {
                    sink(Output::Chunk(&chunk))?;
                }
            }
        }
    }
    Ok(())
}

/// Opens `root` under `trx`, collects every output row and closes it.
///
/// `close` runs even when opening or draining fails. A close failure is
/// reported only if everything before it succeeded.
pub fn collect_rows(
    root: &mut PhysicalOperator,
    trx: &dyn Transaction,
    mode: ExecutionMode,
) -> Result<Vec<Tuple>, ExecutorError> {
    let mut rows = Vec::new();
    let result = open_and_drain(root, trx, mode, &mut rows);
    let closed = root.close();
    match (result, closed) {
        (Err(e), closed) => {
            if let Err(close_err) = closed {
                warn!(error = %close_err, "failed to close operator tree after error");
            }
            Err(e)
        }
        (Ok(()), Err(e)) => Err(e),
        (Ok(()), Ok(())) => Ok(rows),
    }
}

fn open_and_drain(
    root: &mut PhysicalOperator,
    trx: &dyn Transaction,
    mode: ExecutionMode,
    rows: &mut Vec<Tuple>,
) -> Result<(), ExecutorError> {
    check_mode(root, mode)?;
    root.open(trx)?;
    drain(root, mode, |output| {
        match output {
            Output::Tuple(tuple) => rows.push(tuple.clone()),
            Output::Chunk(chunk) => rows.extend(
                (0..chunk.rows())
                    .filter_map(|r| chunk.row_values(r))
                    .map(Tuple::new),
            ),
        }
        Ok(())
    })
}
