//! DTOs module - Data Transfer Objects
//!
//! Questo modulo contiene tutti i DTOs usati per la comunicazione
//! client-server. I DTOs separano la rappresentazione esterna (API) dalla
//! rappresentazione interna (entities).

pub mod connection;
pub mod event;
pub mod invitation;
pub mod member;
pub mod playlist;
pub mod query;
pub mod sync_event;

// Re-exports per mantenere import compatti nei services
pub use connection::ConnectionDTO;
pub use event::{
    AccessDTO, CreateEventDTO, EventDTO, GeofenceDTO, NowPlayingDTO, QueueTrackDTO,
    QueuedTrackDTO, UpdateEventDTO, VoteResultDTO,
};
pub use invitation::{CreateInvitationDTO, EnrichedInvitationDTO, InvitationDTO, NewInvitationDTO};
pub use member::{MemberDTO, RemovalDTO};
pub use playlist::{
    AddTrackDTO, CreatePlaylistDTO, MoveTrackDTO, PlaylistDTO, UpdatePlaylistDTO,
};
pub use query::{AccessQuery, ConnectionsQuery};
pub use sync_event::{ClientCommandDTO, SyncEventDTO};

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Formato degli id brano del catalogo (es. "spotify:track:4uLU6hMC")
    pub static ref TRACK_ID_RE: Regex =
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9:_\-]{0,63}$").expect("track id regex compiles");
}
