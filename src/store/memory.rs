//! In-memory document store - Collezioni versionate con mutazioni atomiche
//!
//! Ogni `Collection<T>` è una mappa concorrente id -> documento versionato.
//! La mutazione atomica lavora su una copia del documento tenendo il lock
//! della entry: due scrittori concorrenti sullo stesso documento vengono
//! serializzati, su `Err` non viene committato nulla. Ogni commit emette un
//! `DocChange` sul canale broadcast della collezione, in ordine di commit.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;

/// Capacità del canale broadcast delle modifiche per collezione
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// Errori del layer di storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Documento inesistente
    NotFound,
    /// Backend non raggiungibile (riservato a implementazioni persistenti)
    Unavailable(&'static str),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "document not found"),
            StoreError::Unavailable(reason) => write!(f, "store unavailable: {}", reason),
        }
    }
}

impl std::error::Error for StoreError {}

/// Notifica di modifica emessa ad ogni commit
#[derive(Debug, Clone)]
pub struct DocChange {
    pub collection: &'static str,
    pub id: String,
    pub version: u64,
    pub deleted: bool,
}

/// Esito di una mutazione atomica: riscrivere, cancellare o lasciare
/// invariato il documento (no-op senza bump di versione né notifica)
pub enum Commit<R> {
    Write(R),
    Delete(R),
    Keep(R),
}

struct Versioned<T> {
    doc: T,
    version: u64,
}

/// Collezione concorrente di documenti versionati
pub struct Collection<T> {
    name: &'static str,
    docs: DashMap<String, Versioned<T>>,
    changes: broadcast::Sender<DocChange>,
}

impl<T: Clone> Collection<T> {
    pub fn new(name: &'static str) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Collection {
            name,
            docs: DashMap::new(),
            changes,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Sottoscrive il feed delle modifiche della collezione
    pub fn watch(&self) -> broadcast::Receiver<DocChange> {
        self.changes.subscribe()
    }

    /// Inserisce (o sovrascrive) un documento, ritorna la versione committata
    pub fn insert(&self, id: &str, doc: T) -> u64 {
        match self.docs.entry(id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let version = occupied.get().version + 1;
                occupied.insert(Versioned { doc, version });
                self.emit(id, version, false);
                version
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Versioned { doc, version: 1 });
                self.emit(id, 1, false);
                1
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.docs.get(id).map(|entry| entry.doc.clone())
    }

    pub fn get_versioned(&self, id: &str) -> Option<(T, u64)> {
        self.docs
            .get(id)
            .map(|entry| (entry.doc.clone(), entry.version))
    }

    /// Cancella un documento; ritorna false se non esisteva
    pub fn delete(&self, id: &str) -> bool {
        match self.docs.remove(id) {
            Some((_, removed)) => {
                self.emit(id, removed.version + 1, true);
                true
            }
            None => false,
        }
    }

    pub fn all(&self) -> Vec<T> {
        self.docs.iter().map(|entry| entry.doc.clone()).collect()
    }

    /// Filtro sui documenti (la `query(filter)` del contratto di store)
    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.docs
            .iter()
            .filter(|entry| predicate(&entry.doc))
            .map(|entry| entry.doc.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Mutazione atomica read-modify-write.
    ///
    /// La closure riceve una copia del documento e decide se riscriverla
    /// (`Commit::Write`) o cancellare il documento (`Commit::Delete`).
    /// Il lock della entry resta acquisito per tutta la mutazione: scrittori
    /// concorrenti sullo stesso id vengono serializzati. Su `Err` il
    /// documento resta invariato.
    pub fn mutate<R, E>(
        &self,
        id: &str,
        f: impl FnOnce(&mut T) -> Result<Commit<R>, E>,
    ) -> Result<(R, u64), E>
    where
        E: From<StoreError>,
    {
        let entry = self.docs.entry(id.to_string());
        let mut occupied = match entry {
            Entry::Occupied(occupied) => occupied,
            Entry::Vacant(_) => return Err(StoreError::NotFound.into()),
        };

        let mut draft = occupied.get().doc.clone();
        match f(&mut draft)? {
            Commit::Write(result) => {
                let version = occupied.get().version + 1;
                occupied.insert(Versioned { doc: draft, version });
                self.emit(id, version, false);
                Ok((result, version))
            }
            Commit::Delete(result) => {
                let version = occupied.get().version + 1;
                occupied.remove();
                self.emit(id, version, true);
                Ok((result, version))
            }
            Commit::Keep(result) => {
                let version = occupied.get().version;
                Ok((result, version))
            }
        }
    }

    /// Variante di `mutate` che riscrive sempre il documento
    pub fn update<R, E>(
        &self,
        id: &str,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Result<(R, u64), E>
    where
        E: From<StoreError>,
    {
        self.mutate(id, |doc| f(doc).map(Commit::Write))
    }

    fn emit(&self, id: &str, version: u64, deleted: bool) {
        // Nessun receiver attivo non è un errore
        let _ = self.changes.send(DocChange {
            collection: self.name,
            id: id.to_string(),
            version,
            deleted,
        });
    }
}
