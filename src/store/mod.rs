//! Store module - Document store persistente con primitive atomiche
//!
//! Questo modulo definisce il contratto del document store usato da tutti i
//! repository: lettura/scrittura per documento, mutazione atomica
//! read-modify-write e feed di sottoscrizione alle modifiche.
//! L'implementazione in-memory vive in `memory.rs`; un backend persistente
//! può essere sostituito mantenendo le stesse primitive.

pub mod memory;

pub use memory::{Collection, Commit, DocChange, StoreError, CHANGE_FEED_CAPACITY};
