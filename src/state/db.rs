//! SQLite store for the hotplug slot and connection-state tables.
//!
//! Migration is applied inline via `include_str!` on first open. Saves
//! replace a whole table inside one transaction.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::attrs::Attributes;
use crate::state::{ConnState, HotplugSlotDef, Snapshot};

/// Plugboard's SQLite state database.
pub struct StateDb {
    pool: SqlitePool,
}

fn decode_attrs(column: &str, raw: &str) -> anyhow::Result<Attributes> {
    serde_json::from_str(raw).with_context(|| format!("malformed {column} JSON"))
}

impl StateDb {
    /// Open (or create) the state database at the given path and apply migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migration fails.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create state db directory {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .pragma("trusted_schema", "OFF");

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open state db at {}", path.display()))?;

        let migration_sql = include_str!("../../migrations/001_plugboard_schema.sql");
        sqlx::raw_sql(migration_sql)
            .execute(&pool)
            .await
            .context("failed to apply plugboard schema migration")?;

        Ok(Self { pool })
    }

    /// Read the hotplug slot table.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or a row holds malformed JSON.
    pub async fn load_hotplug_slots(&self) -> anyhow::Result<BTreeMap<String, HotplugSlotDef>> {
        let rows = sqlx::query_as::<_, (String, String, String, String, bool)>(
            "SELECT name, interface, static_attrs, device_key, hotplug_gone
             FROM hotplug_slots ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to query hotplug slots")?;

        rows.into_iter()
            .map(|(name, interface, attrs, device_key, hotplug_gone)| {
                let def = HotplugSlotDef {
                    static_attrs: decode_attrs("static_attrs", &attrs)?,
                    name: name.clone(),
                    interface,
                    device_key,
                    hotplug_gone,
                };
                Ok::<_, anyhow::Error>((name, def))
            })
            .collect()
    }

    /// Replace the hotplug slot table.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn save_hotplug_slots(
        &self,
        slots: &BTreeMap<String, HotplugSlotDef>,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;
        sqlx::query("DELETE FROM hotplug_slots")
            .execute(&mut *tx)
            .await
            .context("failed to clear hotplug slots")?;
        for def in slots.values() {
            let attrs = serde_json::to_string(&def.static_attrs)?;
            sqlx::query(
                "INSERT INTO hotplug_slots (name, interface, static_attrs, device_key, hotplug_gone)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&def.name)
            .bind(&def.interface)
            .bind(attrs)
            .bind(&def.device_key)
            .bind(def.hotplug_gone)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to store hotplug slot {}", def.name))?;
        }
        tx.commit().await.context("failed to commit hotplug slots")?;
        Ok(())
    }

    /// Read the connection-state table.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or a row holds malformed JSON.
    pub async fn load_connections(&self) -> anyhow::Result<BTreeMap<String, ConnState>> {
        let rows = sqlx::query_as::<_, (String, String, String, bool, bool, String, String)>(
            "SELECT id, interface, hotplug_key, hotplug_gone, auto, plug_dynamic_attrs, slot_dynamic_attrs
             FROM connections ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to query connections")?;

        rows.into_iter()
            .map(|(id, interface, hotplug_key, hotplug_gone, auto, plug, slot)| {
                let st = ConnState {
                    interface,
                    hotplug_key,
                    hotplug_gone,
                    auto,
                    plug_dynamic_attrs: decode_attrs("plug_dynamic_attrs", &plug)?,
                    slot_dynamic_attrs: decode_attrs("slot_dynamic_attrs", &slot)?,
                };
                Ok::<_, anyhow::Error>((id, st))
            })
            .collect()
    }

    /// Replace the connection-state table.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn save_connections(&self, conns: &BTreeMap<String, ConnState>) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;
        sqlx::query("DELETE FROM connections")
            .execute(&mut *tx)
            .await
            .context("failed to clear connections")?;
        for (id, st) in conns {
            sqlx::query(
                "INSERT INTO connections
                   (id, interface, hotplug_key, hotplug_gone, auto, plug_dynamic_attrs, slot_dynamic_attrs)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(id)
            .bind(&st.interface)
            .bind(&st.hotplug_key)
            .bind(st.hotplug_gone)
            .bind(st.auto)
            .bind(serde_json::to_string(&st.plug_dynamic_attrs)?)
            .bind(serde_json::to_string(&st.slot_dynamic_attrs)?)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to store connection {id}"))?;
        }
        tx.commit().await.context("failed to commit connections")?;
        Ok(())
    }

    /// Read both tables.
    ///
    /// # Errors
    ///
    /// See [`StateDb::load_hotplug_slots`] and [`StateDb::load_connections`].
    pub async fn load_snapshot(&self) -> anyhow::Result<Snapshot> {
        Ok(Snapshot {
            hotplug_slots: self.load_hotplug_slots().await?,
            conns: self.load_connections().await?,
        })
    }

    /// Replace both tables.
    ///
    /// # Errors
    ///
    /// See [`StateDb::save_hotplug_slots`] and [`StateDb::save_connections`].
    pub async fn save_snapshot(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        self.save_hotplug_slots(&snapshot.hotplug_slots).await?;
        self.save_connections(&snapshot.conns).await
    }
}

impl std::fmt::Debug for StateDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateDb").finish_non_exhaustive()
    }
}
