//! Write path: edit buffer for one record.
//!
//! A [`Draft`] collects changed fields only, encodes relational edits as
//! x2many commands, and submits them in a single request. A failed save
//! keeps every edit so the user can correct and resubmit. Refreshing the
//! cache afterwards is the caller's job.

use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::collection::Collection;
use crate::command::X2ManyCommand;
use crate::error::ApiError;
use crate::http::ProxyClient;
use crate::record::{Many2one, Record};
use crate::session::TokenSource;

/// How long a failure notice stays visible.
pub const NOTICE_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Default)]
pub struct Draft {
    original: Option<Record>,
    values: Map<String, Value>,
}

impl Draft {
    /// Empty draft for a new record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Draft editing an existing record.
    pub fn edit(record: Record) -> Self {
        Self {
            original: Some(record),
            values: Map::new(),
        }
    }

    pub fn original(&self) -> Option<&Record> {
        self.original.as_ref()
    }

    /// Changed fields, as they will be sent.
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn is_dirty(&self) -> bool {
        !self.values.is_empty()
    }

    /// Drop all edits.
    pub fn discard(&mut self) {
        self.values.clear();
    }

    /// Set a plain field. Setting it back to the original value un-dirties it.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        let unchanged = self
            .original
            .as_ref()
            .and_then(|r| r.raw(field))
            .is_some_and(|orig| *orig == value);
        if unchanged {
            self.values.remove(field);
        } else {
            self.values.insert(field.to_string(), value);
        }
        self
    }

    /// Set a many2one field by id (`Many2one::Unset` writes `false`).
    pub fn set_many2one(&mut self, field: &str, value: Many2one) -> &mut Self {
        let unchanged = self
            .original
            .as_ref()
            .is_some_and(|r| r.many2one(field).id() == value.id());
        if unchanged {
            self.values.remove(field);
        } else {
            self.values.insert(field.to_string(), value.to_write_value());
        }
        self
    }

    /// Replace a many2many set: `[6, 0, ids]`.
    ///
    /// The replace goes first in the field's command list; queued
    /// create/update commands are kept after it. An unchanged set with
    /// nothing else queued leaves the field clean.
    pub fn replace_many2many(&mut self, field: &str, ids: &[i64]) -> &mut Self {
        let mut wanted = ids.to_vec();
        wanted.sort_unstable();
        wanted.dedup();
        let unchanged = self.original.as_ref().is_some_and(|r| {
            let mut current = r.many2many(field);
            current.sort_unstable();
            current.dedup();
            current == wanted
        });
        let queued = self
            .commands(field)
            .into_iter()
            .filter(|c| matches!(c, X2ManyCommand::Create(_) | X2ManyCommand::Update(..)));
        let cmds: Vec<X2ManyCommand> = if unchanged {
            queued.collect()
        } else {
            std::iter::once(X2ManyCommand::Replace(ids.to_vec())).chain(queued).collect()
        };
        if cmds.is_empty() {
            self.values.remove(field);
        } else {
            self.values.insert(field.to_string(), X2ManyCommand::list_value(&cmds));
        }
        self
    }

    /// Create and link a related record: appends `[0, 0, values]`.
    pub fn create_related(&mut self, field: &str, values: Map<String, Value>) -> &mut Self {
        let mut cmds = self.commands(field);
        cmds.push(X2ManyCommand::Create(values));
        self.values.insert(field.to_string(), X2ManyCommand::list_value(&cmds));
        self
    }

    /// Pending x2many commands for `field`.
    pub fn commands(&self, field: &str) -> Vec<X2ManyCommand> {
        match self.values.get(field) {
            Some(Value::Array(items)) => items.iter().filter_map(X2ManyCommand::from_value).collect(),
            _ => Vec::new(),
        }
    }

    /// Submit the changes to `PUT /<collection>/:id`.
    ///
    /// A clean draft sends nothing. On success the draft becomes clean;
    /// on failure it is left untouched.
    pub async fn save_update(
        &mut self,
        client: &ProxyClient,
        tokens: &dyn TokenSource,
        collection: Collection,
        id: i64,
    ) -> Result<(), ApiError> {
        if !self.is_dirty() {
            return Ok(());
        }
        let sid = session_id(tokens).await?;
        match client.update(collection, id, &sid, &self.values).await {
            Ok(()) => {
                info!("{collection}/{id}: saved {} field(s)", self.values.len());
                self.commit();
                Ok(())
            }
            Err(e) => {
                warn!("{collection}/{id}: save failed: {e}");
                Err(e)
            }
        }
    }

    /// Submit the draft to `POST /<collection>/create`. Returns the new id.
    pub async fn save_create(
        &mut self,
        client: &ProxyClient,
        tokens: &dyn TokenSource,
        collection: Collection,
    ) -> Result<i64, ApiError> {
        let sid = session_id(tokens).await?;
        match client.create(collection, &sid, &self.values).await {
            Ok(id) => {
                info!("{collection}: created #{id}");
                self.commit();
                Ok(id)
            }
            Err(e) => {
                warn!("{collection}: create failed: {e}");
                Err(e)
            }
        }
    }

    /// Fold scalar edits into the original and clear the buffer.
    fn commit(&mut self) {
        let values = std::mem::take(&mut self.values);
        if let Some(original) = self.original.take() {
            let mut fields = original.into_fields();
            for (k, v) in values {
                let is_commands = v
                    .as_array()
                    .is_some_and(|items| items.iter().any(|i| X2ManyCommand::from_value(i).is_some()));
                if !is_commands {
                    fields.insert(k, v);
                }
            }
            self.original = Some(Record::new(fields));
        }
    }
}

async fn session_id(tokens: &dyn TokenSource) -> Result<String, ApiError> {
    tokens
        .token()
        .await?
        .ok_or_else(|| ApiError::Auth("not signed in".into()))
}

// ── WriteNotice ─────────────────────────────────────────────────────

/// Short-lived failure message shown after a rejected save.
#[derive(Debug, Clone)]
pub struct WriteNotice {
    pub message: String,
    pub expires_at: Instant,
}

impl WriteNotice {
    pub fn new(message: impl Into<String>, ttl: Duration) -> Self {
        Self {
            message: message.into(),
            expires_at: Instant::now() + ttl,
        }
    }

    /// Notice for a failed save, using the server's wording when it has one.
    pub fn from_error(err: &ApiError) -> Self {
        Self::new(err.user_message(), NOTICE_TTL)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}
