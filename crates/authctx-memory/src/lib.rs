// authctx-memory: in-memory storage contexts for authctx.
//
// HashMap-backed tables with unique primary keys, optional foreign keys, and
// snapshot transactions. Backs the test suites and local prototypes.

pub mod context;

pub use context::{ForeignKey, MemoryConnection, MemoryContext, MemoryTransaction, TableDefinition, Tables};
