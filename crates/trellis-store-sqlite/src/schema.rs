//! SQL schema for the Trellis SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS members (
    member_id      TEXT PRIMARY KEY,
    wallet         TEXT NOT NULL UNIQUE,   -- lower-cased on entry
    sponsor_wallet TEXT,                   -- NULL only for the root
    current_level  INTEGER NOT NULL DEFAULT 0,
    bcc_balance    TEXT NOT NULL DEFAULT '0',
    status         TEXT NOT NULL DEFAULT 'active',  -- 'active' | 'suspended'
    joined_at      TEXT NOT NULL
);

-- Placement edges are written exactly once and never mutated.
-- UNIQUE (parent_id, position) is the slot-race source of truth;
-- UNIQUE (child_id) forbids a second incoming edge.
CREATE TABLE IF NOT EXISTS placements (
    parent_id  TEXT NOT NULL REFERENCES members(member_id),
    child_id   TEXT NOT NULL REFERENCES members(member_id),
    position   INTEGER NOT NULL CHECK (position BETWEEN 1 AND 3),
    created_at TEXT NOT NULL,
    UNIQUE (parent_id, position),
    UNIQUE (child_id)
);

-- Ancestor closure: one row per true ancestor/descendant pair, written in
-- the same transaction as the placement edge. Never mutated or deleted.
CREATE TABLE IF NOT EXISTS closure (
    ancestor_id   TEXT NOT NULL REFERENCES members(member_id),
    descendant_id TEXT NOT NULL REFERENCES members(member_id),
    depth         INTEGER NOT NULL,
    PRIMARY KEY (ancestor_id, descendant_id)
);

CREATE TABLE IF NOT EXISTS rewards (
    reward_id        TEXT PRIMARY KEY,
    recipient_wallet TEXT NOT NULL,
    source_wallet    TEXT NOT NULL,
    kind             TEXT NOT NULL,   -- 'direct_sponsor' | 'layer_payout' | 'bcc_token'
    currency         TEXT NOT NULL,   -- 'USDT' | 'BCC'
    amount           TEXT NOT NULL,   -- canonical decimal string, > 0
    status           TEXT NOT NULL,   -- 'pending' | 'instant'
    layer            INTEGER,
    level            INTEGER,
    created_at       TEXT NOT NULL,
    expires_at       TEXT,
    notes            TEXT
);

-- A level's BCC credit is granted exactly once per source wallet even if
-- the distribution call is retried after a partial failure.
CREATE UNIQUE INDEX IF NOT EXISTS rewards_bcc_once_idx
    ON rewards(source_wallet, level) WHERE kind = 'bcc_token';

-- Withdrawal outbox. An intent is written 'created' before the external
-- transfer fires and flipped 'settled' once a hash exists; only the ledger
-- reconciliation transaction may flip it 'reconciled'. A lingering
-- 'settled' row means funds moved without a matching ledger mutation.
CREATE TABLE IF NOT EXISTS transfer_intents (
    intent_id  TEXT PRIMARY KEY,
    wallet     TEXT NOT NULL,
    currency   TEXT NOT NULL,
    amount     TEXT NOT NULL,
    tx_hash    TEXT,
    state      TEXT NOT NULL,   -- 'created' | 'settled' | 'failed' | 'reconciled'
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Settled movement only; rows are inserted confirmed and never updated.
CREATE TABLE IF NOT EXISTS transactions (
    transaction_id TEXT PRIMARY KEY,
    wallet         TEXT NOT NULL,
    kind           TEXT NOT NULL,   -- 'withdrawal' | 'purchase'
    currency       TEXT NOT NULL,
    amount         TEXT NOT NULL,
    status         TEXT NOT NULL,   -- 'pending' | 'confirmed'
    tx_hash        TEXT,
    block_number   INTEGER,
    created_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS placements_parent_idx ON placements(parent_id);
CREATE INDEX IF NOT EXISTS closure_descendant_idx ON closure(descendant_id);
CREATE INDEX IF NOT EXISTS rewards_recipient_idx
    ON rewards(recipient_wallet, status, created_at);
CREATE INDEX IF NOT EXISTS transactions_wallet_idx ON transactions(wallet);
CREATE INDEX IF NOT EXISTS transfer_intents_state_idx
    ON transfer_intents(state, created_at);

PRAGMA user_version = 1;
";
