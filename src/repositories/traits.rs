//! Common repository traits
//!
//! This module defines generic interfaces for document-store operations.
//! There is intentionally no generic `Update` trait: every write that
//! depends on the current document state goes through the store's atomic
//! `mutate`, exposed by each repository, so that check-and-set sequences
//! cannot lose updates.

use crate::store::StoreError;

/// Trait for creating new entities in the store
///
/// # Type Parameters
/// * `Entity` - Type of the returned entity (with ID assigned at creation)
/// * `CreateDTO` - Data needed for creation (without ID)
pub trait Create<Entity, CreateDTO> {
    /// Creates a new entity in the store
    ///
    /// # Returns
    /// * `Ok(Entity)` - Created entity with its assigned ID
    /// * `Err(StoreError)` - Error during insertion
    async fn create(&self, data: &CreateDTO) -> Result<Entity, StoreError>;
}

/// Trait for reading a single entity by primary key
///
/// # Type Parameters
/// * `Entity` - Type of the entity to read
/// * `Id` - Type of the primary key (e.g. `Uuid`, `String`)
pub trait Read<Entity, Id> {
    /// Reads an entity from the store by its primary key
    ///
    /// # Returns
    /// * `Ok(Some(Entity))` - Entity found
    /// * `Ok(None)` - No entity with that ID
    /// * `Err(StoreError)` - Error during reading
    async fn read(&self, id: &Id) -> Result<Option<Entity>, StoreError>;
}

/// Trait for deleting entities
///
/// # Type Parameters
/// * `Id` - Type of the primary key
pub trait Delete<Id> {
    /// Deletes an entity from the store
    ///
    /// # Returns
    /// * `Ok(())` - Deletion successful (idempotent on missing documents)
    /// * `Err(StoreError)` - Error during deletion
    async fn delete(&self, id: &Id) -> Result<(), StoreError>;
}
