/*!
 * ForgeHook Auto-Fix Pipeline
 *
 * Consumes runtime/build error texts observed in a user's generated app
 * sandbox, classifies them, and drives bounded automatic repair attempts.
 * Shares the retry/backoff family with the delivery queue.
 */

pub mod classifier;
pub mod pipeline;

pub use classifier::classify;
pub use pipeline::{FixExecutor, FixPipeline, SubmitOutcome};
