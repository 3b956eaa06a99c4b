/// Event persistence
///
/// - `serialization`: the attribute-item storage format and its
///   round-trip guarantees
/// - `store`: the `Persister` contract and the in-memory reference
///   implementation
pub mod serialization;
pub mod store;

pub use serialization::{event_to_item, item_to_event, Item, PersistError};
pub use store::{InMemoryPersister, Persister};
