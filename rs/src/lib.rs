//! RunStore - file-backed persistence for optimisation runs
//!
//! Stores evaluation results keyed by `(run id, iteration)` and the full
//! message history keyed by run id. Values are opaque to the store: any
//! `Serialize`/`DeserializeOwned` type can be written and read back.
//!
//! # Layout
//!
//! ```text
//! .runstore/
//! └── {run_id}/
//!     ├── run.json             # run metadata
//!     ├── messages.jsonl       # one message per line
//!     └── evals/
//!         ├── iteration-0000.json
//!         ├── iteration-0001.json
//!         └── ...
//! ```
//!
//! # Example
//!
//! ```ignore
//! use runstore::RunStore;
//!
//! let store = RunStore::open(".runstore")?;
//! let run_id = RunStore::new_run_id();
//! store.put_iteration(&run_id, 0, &results)?;
//! let back: Option<Vec<EvalResult>> = store.get_iteration(&run_id, 0)?;
//! ```

mod store;

pub use store::{RunId, RunMeta, RunStore};
