//! Membership services - Gestione partecipanti, inviti e ownership
//!
//! Gli handler sono condivisi tra playlist ed eventi: il membership
//! middleware inserisce nelle Extension la `Membership` con il tipo di
//! entità del path. Ogni scrittura su partecipanti e owner passa dalla
//! mutazione atomica del documento.

use crate::core::{AppError, AppState, CurrentUser, Membership, require_owner};
use crate::dtos::{
    CreateInvitationDTO, EnrichedInvitationDTO, InvitationDTO, MemberDTO, NewInvitationDTO,
    RemovalDTO, SyncEventDTO,
};
use crate::entities::{CollabCore, EntityKind, InvitationStatus, Removal};
use crate::notify::{NotificationPayload, notify_best_effort};
use crate::repositories::{Create, Read};
use crate::store::Commit;
use crate::sync::sessionmap::InternalSignal;
use axum::{
    Extension,
    extract::{Json, Path, State},
};
use axum_macros::debug_handler;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Carica il core condiviso e gli host dell'entità (host vuoti per le
/// playlist)
async fn load_core(
    state: &AppState,
    kind: EntityKind,
    entity_id: &Uuid,
) -> Result<(CollabCore, Vec<String>), AppError> {
    match kind {
        EntityKind::Playlist => {
            let playlist = state
                .playlists
                .read(entity_id)
                .await?
                .ok_or_else(|| AppError::not_found("Playlist not found"))?;
            Ok((playlist.core, Vec::new()))
        }
        EntityKind::Event => {
            let event = state
                .events
                .read(entity_id)
                .await?
                .ok_or_else(|| AppError::not_found("Event not found"))?;
            let hosts = event.host_ids.clone();
            Ok((event.core, hosts))
        }
    }
}

/// Aggiunge un partecipante con mutazione atomica; ritorna false se era
/// già presente (idempotente)
async fn add_participant_atomic(
    state: &AppState,
    kind: EntityKind,
    entity_id: &Uuid,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, AppError> {
    let (added, _version) = match kind {
        EntityKind::Playlist => state.playlists.mutate(entity_id, |playlist| {
            if playlist.core.add_participant(user_id, now) {
                playlist.core.touch(now);
                Ok::<_, AppError>(Commit::Write(true))
            } else {
                Ok(Commit::Keep(false))
            }
        })?,
        EntityKind::Event => state.events.mutate(entity_id, |event| {
            if event.core.add_participant(user_id, now) {
                event.core.touch(now);
                Ok::<_, AppError>(Commit::Write(true))
            } else {
                Ok(Commit::Keep(false))
            }
        })?,
    };
    Ok(added)
}

/// Rimuove un partecipante applicando l'algoritmo completo: no-op se non
/// partecipante, cancellazione dell'entità se era l'ultimo, trasferimento
/// deterministico di ownership se usciva l'owner. Per gli eventi mantiene
/// l'invariante host ⊆ partecipanti e promuove il successore a host.
async fn remove_participant_atomic(
    state: &AppState,
    kind: EntityKind,
    entity_id: &Uuid,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Removal, AppError> {
    let (removal, _version) = match kind {
        EntityKind::Playlist => state.playlists.mutate(entity_id, |playlist| {
            let removal = playlist.core.remove_participant(user_id);
            match removal {
                Removal::NotMember => Ok::<_, AppError>(Commit::Keep(removal)),
                Removal::Deleted => Ok(Commit::Delete(removal)),
                Removal::Removed { .. } => {
                    playlist.core.touch(now);
                    Ok(Commit::Write(removal))
                }
            }
        })?,
        EntityKind::Event => state.events.mutate(entity_id, |event| {
            let removal = event.core.remove_participant(user_id);
            match removal {
                Removal::NotMember => Ok::<_, AppError>(Commit::Keep(removal)),
                Removal::Deleted => Ok(Commit::Delete(removal)),
                Removal::Removed { new_owner_id } => {
                    event.remove_host(user_id);
                    if let Some(ref successor) = new_owner_id {
                        event.add_host(successor);
                    }
                    event.core.touch(now);
                    Ok(Commit::Write(Removal::Removed { new_owner_id }))
                }
            }
        })?,
    };
    Ok(removal)
}

/// Effetti collaterali post-rimozione: GC inviti su cancellazione,
/// eventi real-time e notifica al nuovo owner
async fn after_removal(
    state: &AppState,
    kind: EntityKind,
    entity_id: &Uuid,
    removed_user: &str,
    removal: &Removal,
) {
    let topic = entity_id.to_string();
    match removal {
        Removal::NotMember => {}
        Removal::Deleted => {
            // L'entità non esiste più: scartare anche i suoi inviti
            match state.invitations.delete_for_entity(entity_id).await {
                Ok(count) if count > 0 => {
                    info!(count, "Garbage collected invitations for deleted entity");
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to garbage collect invitations: {:?}", e),
            }
            state
                .sessions
                .send_if_online(removed_user, InternalSignal::Unwatch(topic));
        }
        Removal::Removed { new_owner_id } => {
            let _ = state.topics.send(
                &topic,
                Arc::new(SyncEventDTO::MemberLeft {
                    id: topic.clone(),
                    user_id: removed_user.to_string(),
                }),
            );
            state
                .sessions
                .send_if_online(removed_user, InternalSignal::Unwatch(topic.clone()));

            if let Some(new_owner) = new_owner_id {
                // evento distinto dall'update generico: la UI lo tratta
                // in modo speciale
                let _ = state.topics.send(
                    &topic,
                    Arc::new(SyncEventDTO::OwnershipTransferred {
                        id: topic.clone(),
                        new_owner_id: new_owner.clone(),
                    }),
                );
                notify_best_effort(
                    state.notifier.as_ref(),
                    new_owner,
                    NotificationPayload {
                        title: "You are now the owner".to_string(),
                        body: format!("Ownership of a {} was transferred to you", kind.as_str()),
                        entity_id: Some(topic),
                    },
                );
            }
        }
    }
}

#[instrument(skip(state, membership), fields(entity_id = %membership.entity_id))]
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    Extension(membership): Extension<Membership>, // ottenuto dal membership middleware (verifica già la partecipazione)
) -> Result<Json<Vec<MemberDTO>>, AppError> {
    debug!("Listing members for entity");
    let (core, hosts) = load_core(&state, membership.entity_kind, &membership.entity_id).await?;

    let members: Vec<MemberDTO> = core
        .participants
        .iter()
        .map(|p| MemberDTO {
            user_id: p.user_id.clone(),
            joined_at: p.joined_at,
            is_owner: core.owner_id == p.user_id,
            is_host: hosts.iter().any(|h| *h == p.user_id),
        })
        .collect();

    info!("Successfully retrieved {} members", members.len());
    Ok(Json(members))
}

#[debug_handler]
#[instrument(skip(state, current_user, membership, body), fields(entity_id = %membership.entity_id, inviting_user = %current_user.user_id))]
pub async fn invite(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(membership): Extension<Membership>, // ottenuto dal membership middleware
    Json(body): Json<CreateInvitationDTO>,
) -> Result<Json<InvitationDTO>, AppError> {
    debug!("Inviting user to entity");
    // 1. Validare il body: esattamente uno tra invitee_id e invitee_email
    // 2. Rifiutare l'auto-invito (per id o per email dell'attore)
    // 3. Verificare che il destinatario non sia già partecipante
    // 4. Se esiste già un invito pending per la coppia, ritornare quello
    // 5. Creare l'invito nel database
    // 6. Consegnare l'invito via WebSocket al destinatario (se online)
    // 7. Push notification best-effort: un fallimento non fa fallire l'invito
    // 8. Ritornare l'InvitationDTO

    body.validate()?;

    match (&body.invitee_id, &body.invitee_email) {
        (Some(_), Some(_)) | (None, None) => {
            warn!("Invite must target exactly one of invitee_id or invitee_email");
            return Err(AppError::validation(
                "Specify exactly one of invitee_id or invitee_email",
            ));
        }
        _ => {}
    }

    let is_self_invite = body.invitee_id.as_deref() == Some(current_user.user_id.as_str())
        || matches!(
            (&body.invitee_email, &current_user.email),
            (Some(invited), Some(own)) if invited.eq_ignore_ascii_case(own)
        );
    if is_self_invite {
        warn!("User attempted to invite themselves");
        return Err(AppError::validation("You cannot invite yourself"));
    }

    let (core, _) = load_core(&state, membership.entity_kind, &membership.entity_id).await?;

    if let Some(ref invitee_id) = body.invitee_id {
        if core.is_participant(invitee_id) {
            warn!("Invitee {} is already a participant", invitee_id);
            return Err(AppError::invalid_state(
                "User is already a participant of this entity",
            ));
        }
    }

    // Invito pending già esistente per la stessa coppia: si ritorna quello,
    // mai un duplicato
    if let Some(existing) = state
        .invitations
        .find_pending_for_entity(
            &membership.entity_id,
            body.invitee_id.as_deref(),
            body.invitee_email.as_deref(),
        )
        .await?
    {
        info!(
            "Pending invitation {} already exists, returning it",
            existing.invite_id
        );
        return Ok(Json(existing.into()));
    }

    let invitation = state
        .invitations
        .create(&NewInvitationDTO {
            entity_id: membership.entity_id,
            entity_kind: membership.entity_kind,
            inviter_id: current_user.user_id.clone(),
            invitee_id: body.invitee_id.clone(),
            invitee_email: body.invitee_email.clone(),
        })
        .await?;

    debug!("Invitation created with id {}", invitation.invite_id);

    if let Some(ref invitee_id) = invitation.invitee_id {
        let enriched = EnrichedInvitationDTO {
            invite_id: invitation.invite_id,
            entity_id: invitation.entity_id,
            entity_kind: invitation.entity_kind,
            inviter_id: invitation.inviter_id.clone(),
            state: invitation.state,
            created_at: invitation.created_at,
            entity_name: Some(core.name.clone()),
        };
        state.sessions.send_if_online(
            invitee_id,
            InternalSignal::Deliver(SyncEventDTO::InvitationCreated(enriched)),
        );
        notify_best_effort(
            state.notifier.as_ref(),
            invitee_id,
            NotificationPayload {
                title: format!("Invitation to {}", core.name),
                body: format!("{} invited you to join", current_user.username),
                entity_id: Some(membership.entity_id.to_string()),
            },
        );
    }

    info!("User successfully invited to entity");
    Ok(Json(invitation.into()))
}

#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id))]
pub async fn list_pending_invitations(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<Vec<EnrichedInvitationDTO>>, AppError> {
    debug!("Listing pending invitations for user");
    // 1. Recuperare tutti gli inviti pending indirizzati all'utente
    //    (per id oppure per email del token)
    // 2. Arricchire ogni invito con il nome dell'entità
    // 3. Ritornare la lista di EnrichedInvitationDTO come risposta JSON

    let invitations = state
        .invitations
        .find_pending_for_user(&current_user.user_id, current_user.email.as_deref())
        .await?;

    info!("Found {} pending invitations", invitations.len());

    // Arricchimento in parallelo (lookup per primary key, velocissimo);
    // un'entità nel frattempo cancellata lascia il nome assente
    let cores = join_all(
        invitations
            .iter()
            .map(|inv| load_core(&state, inv.entity_kind, &inv.entity_id)),
    )
    .await;

    let enriched_invitations: Vec<EnrichedInvitationDTO> = invitations
        .into_iter()
        .zip(cores)
        .map(|(invitation, core_result)| EnrichedInvitationDTO {
            invite_id: invitation.invite_id,
            entity_id: invitation.entity_id,
            entity_kind: invitation.entity_kind,
            inviter_id: invitation.inviter_id,
            state: invitation.state,
            created_at: invitation.created_at,
            entity_name: core_result.ok().map(|(core, _)| core.name),
        })
        .collect();

    Ok(Json(enriched_invitations))
}

#[instrument(skip(state, current_user), fields(invite_id = %invite_id, action = %action, user_id = %current_user.user_id))]
pub async fn respond_to_invitation(
    State(state): State<Arc<AppState>>,
    Path((invite_id, action)): Path<(Uuid, String)>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<InvitationDTO>, AppError> {
    debug!("Responding to invitation");
    // 1. Validare che action sia "accept" o "decline"
    // 2. Transizione CAS pending -> accepted/declined dentro la mutazione
    //    atomica: un invito già processato è invalid_state (un re-accept
    //    segnala un client desincronizzato, non va ignorato), un attore
    //    diverso dal destinatario è permission_denied
    // 3. Se accettato: aggiungere il partecipante all'entità; se la
    //    membership fallisce, compensare riportando l'invito a pending
    //    (il lettore non osserva mai accepted senza il partecipante)
    // 4. Inviare segnale Watch al nuovo partecipante e MemberJoined al topic
    // 5. Notificare l'inviter dell'esito (WebSocket + push best-effort)
    // 6. Ritornare l'invito aggiornato

    let new_status = match action.as_str() {
        "accept" => InvitationStatus::Accepted,
        "decline" => InvitationStatus::Declined,
        _ => {
            warn!("Invalid invitation action: {}", action);
            return Err(AppError::validation("Action must be 'accept' or 'decline'"));
        }
    };

    let now = Utc::now();
    let actor_id = current_user.user_id.clone();
    let actor_email = current_user.email.clone();

    let (invitation, _version) = state
        .invitations
        .mutate(&invite_id, |inv| {
            if inv.state != InvitationStatus::Pending {
                warn!(
                    "Invitation {} is already processed: {:?}",
                    invite_id, inv.state
                );
                return Err(AppError::invalid_state("Invitation is already processed")
                    .with_details(format!("Invitation is already {:?}", inv.state)));
            }
            if !inv.is_for(&actor_id, actor_email.as_deref()) {
                warn!(
                    "User {} attempted to respond to an invitation not addressed to them",
                    actor_id
                );
                return Err(AppError::permission_denied(
                    "You are not the recipient of this invitation",
                ));
            }
            inv.state = new_status;
            inv.updated_at = now;
            Ok(Commit::Write(inv.clone()))
        })
        .map_err(|e: AppError| {
            if e.kind() == "not_found" {
                AppError::not_found("Invitation not found")
            } else {
                e
            }
        })?;

    let topic = invitation.entity_id.to_string();

    if new_status == InvitationStatus::Accepted {
        debug!(
            "User accepted invitation, joining {} {}",
            invitation.entity_kind.as_str(),
            invitation.entity_id
        );
        let added = match add_participant_atomic(
            &state,
            invitation.entity_kind,
            &invitation.entity_id,
            &current_user.user_id,
            now,
        )
        .await
        {
            Ok(added) => added,
            Err(e) => {
                // Compensazione: l'entità non è più raggiungibile, l'invito
                // torna pending così lo stato resta coerente per i lettori
                warn!("Membership add failed, rolling invitation back to pending");
                let rollback = state.invitations.mutate(&invite_id, |inv| {
                    inv.state = InvitationStatus::Pending;
                    inv.updated_at = Utc::now();
                    Ok::<_, AppError>(Commit::Write(()))
                });
                if rollback.is_err() {
                    warn!("Failed to roll back invitation {}", invite_id);
                }
                return Err(e);
            }
        };

        if added {
            let _ = state.topics.send(
                &topic,
                Arc::new(SyncEventDTO::MemberJoined {
                    id: topic.clone(),
                    user_id: current_user.user_id.clone(),
                }),
            );
        }
        // Il nuovo partecipante inizia a ricevere gli eventi dell'entità
        state.sessions.send_if_online(
            &current_user.user_id,
            InternalSignal::Watch(topic.clone()),
        );

        state.sessions.send_if_online(
            &invitation.inviter_id,
            InternalSignal::Deliver(SyncEventDTO::InvitationAccepted {
                id: invite_id.to_string(),
            }),
        );
        notify_best_effort(
            state.notifier.as_ref(),
            &invitation.inviter_id,
            NotificationPayload {
                title: "Invitation accepted".to_string(),
                body: format!("{} accepted your invitation", current_user.username),
                entity_id: Some(topic),
            },
        );
    } else {
        debug!("User declined invitation");
        state.sessions.send_if_online(
            &invitation.inviter_id,
            InternalSignal::Deliver(SyncEventDTO::InvitationDeclined {
                id: invite_id.to_string(),
            }),
        );
    }

    info!("Invitation response processed successfully");
    Ok(Json(invitation.into()))
}

#[instrument(skip(state, current_user, membership), fields(entity_id = %membership.entity_id, user_id = %current_user.user_id))]
pub async fn leave_entity(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(membership): Extension<Membership>, // ottenuto dal membership middleware
) -> Result<Json<RemovalDTO>, AppError> {
    debug!("User leaving entity");
    // 1. Rimuovere l'utente con l'algoritmo atomico completo:
    //    - non partecipante -> no-op
    //    - ultimo partecipante -> l'entità viene cancellata
    //    - usciva l'owner -> trasferimento deterministico al partecipante
    //      entrato per primo (pareggi risolti per user id)
    // 2. Effetti collaterali: GC inviti, MemberLeft/OwnershipTransferred,
    //    Unwatch per l'utente uscito, notifica al successore
    // 3. Ritornare l'esito {deleted, new_owner_id}

    let removal = remove_participant_atomic(
        &state,
        membership.entity_kind,
        &membership.entity_id,
        &current_user.user_id,
        Utc::now(),
    )
    .await?;

    after_removal(
        &state,
        membership.entity_kind,
        &membership.entity_id,
        &current_user.user_id,
        &removal,
    )
    .await;

    let dto = match removal {
        Removal::Deleted => RemovalDTO {
            deleted: true,
            new_owner_id: None,
        },
        Removal::Removed { new_owner_id } => RemovalDTO {
            deleted: false,
            new_owner_id,
        },
        Removal::NotMember => RemovalDTO {
            deleted: false,
            new_owner_id: None,
        },
    };

    info!("User successfully left entity");
    Ok(Json(dto))
}

#[instrument(skip(state, current_user, membership), fields(entity_id = %entity_id, removing_user = %current_user.user_id, target_user = %user_id))]
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    Path((entity_id, user_id)): Path<(Uuid, String)>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(membership): Extension<Membership>, // ottenuto dal membership middleware
) -> Result<Json<RemovalDTO>, AppError> {
    debug!("Removing member from entity");
    // 1. Verificare che l'attore sia l'owner (fail-fast)
    // 2. L'owner non può rimuovere se stesso da qui: deve usare leave
    // 3. Rimozione atomica (no-op se il target non è partecipante)
    // 4. Effetti collaterali e notifica al rimosso

    require_owner(&membership)?;

    if user_id == current_user.user_id {
        warn!("Owner attempted to remove themselves via remove_member");
        return Err(AppError::validation(
            "Use the leave endpoint to remove yourself",
        ));
    }

    let removal = remove_participant_atomic(
        &state,
        membership.entity_kind,
        &entity_id,
        &user_id,
        Utc::now(),
    )
    .await?;

    after_removal(&state, membership.entity_kind, &entity_id, &user_id, &removal).await;

    if matches!(removal, Removal::Removed { .. }) {
        notify_best_effort(
            state.notifier.as_ref(),
            &user_id,
            NotificationPayload {
                title: "Removed from entity".to_string(),
                body: format!(
                    "You were removed from a {}",
                    membership.entity_kind.as_str()
                ),
                entity_id: Some(entity_id.to_string()),
            },
        );
    }

    let dto = match removal {
        Removal::Deleted => RemovalDTO {
            deleted: true,
            new_owner_id: None,
        },
        Removal::Removed { new_owner_id } => RemovalDTO {
            deleted: false,
            new_owner_id,
        },
        Removal::NotMember => RemovalDTO {
            deleted: false,
            new_owner_id: None,
        },
    };

    info!("Member successfully removed from entity");
    Ok(Json(dto))
}

#[instrument(skip(state, current_user, membership), fields(entity_id = %entity_id, current_owner = %current_user.user_id, new_owner = %new_owner_id))]
pub async fn transfer_ownership(
    State(state): State<Arc<AppState>>,
    Path((entity_id, new_owner_id)): Path<(Uuid, String)>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(membership): Extension<Membership>, // ottenuto dal membership middleware
) -> Result<(), AppError> {
    debug!("Transferring entity ownership");
    // 1. Verificare che l'attore sia l'owner (fail-fast, ricontrollato
    //    dentro la mutazione atomica)
    // 2. Trasferimento a se stessi non ammesso
    // 3. Il nuovo owner deve essere un partecipante, altrimenti
    //    permission_denied
    // 4. Per gli eventi il nuovo owner entra anche tra gli host
    // 5. Emettere OwnershipTransferred (distinto dall'update generico)
    //    e notificare il nuovo owner

    require_owner(&membership)?;

    if current_user.user_id == new_owner_id {
        warn!("Attempted to transfer ownership to self");
        return Err(AppError::validation("Cannot transfer ownership to yourself"));
    }

    let now = Utc::now();
    let actor_id = current_user.user_id.clone();
    let target_id = new_owner_id.clone();

    match membership.entity_kind {
        EntityKind::Playlist => {
            state.playlists.mutate(&entity_id, |playlist| {
                if playlist.core.owner_id != actor_id {
                    return Err(AppError::permission_denied(
                        "Only the current owner can transfer ownership",
                    ));
                }
                if !playlist.core.is_participant(&target_id) {
                    warn!("New owner {} is not a participant", target_id);
                    return Err(AppError::permission_denied(
                        "New owner must be a participant",
                    ));
                }
                playlist.core.owner_id = target_id.clone();
                playlist.core.touch(now);
                Ok(Commit::Write(()))
            })?;
        }
        EntityKind::Event => {
            state.events.mutate(&entity_id, |event| {
                if event.core.owner_id != actor_id {
                    return Err(AppError::permission_denied(
                        "Only the current owner can transfer ownership",
                    ));
                }
                if !event.core.is_participant(&target_id) {
                    warn!("New owner {} is not a participant", target_id);
                    return Err(AppError::permission_denied(
                        "New owner must be a participant",
                    ));
                }
                event.core.owner_id = target_id.clone();
                event.add_host(&target_id);
                event.core.touch(now);
                Ok(Commit::Write(()))
            })?;
        }
    }

    let topic = entity_id.to_string();
    let _ = state.topics.send(
        &topic,
        Arc::new(SyncEventDTO::OwnershipTransferred {
            id: topic.clone(),
            new_owner_id: new_owner_id.clone(),
        }),
    );
    notify_best_effort(
        state.notifier.as_ref(),
        &new_owner_id,
        NotificationPayload {
            title: "You are now the owner".to_string(),
            body: format!(
                "{} transferred ownership to you",
                current_user.username
            ),
            entity_id: Some(topic),
        },
    );

    info!("Ownership transferred successfully");
    Ok(())
}
