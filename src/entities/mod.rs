//! Entities module - Entità del dominio applicativo
//!
//! Questo modulo contiene tutte le entità (documenti) persistite nel
//! document store. Ogni entity corrisponde a una collezione.

pub mod collab;
pub mod connection;
pub mod enums;
pub mod event;
pub mod invitation;
pub mod playlist;

// Re-exports per facilitare l'import
pub use collab::{CollabCore, Participant, Removal};
pub use connection::{Connection, pair_key};
pub use enums::{
    ConnectionStatus, EditPermissions, EntityKind, InvitationStatus, Visibility, VoteLicense,
};
pub use event::{Event, Geofence, QueuedTrack};
pub use invitation::Invitation;
pub use playlist::{Playlist, TrackRef};
