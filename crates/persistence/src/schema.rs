//! Database schema definitions

/// SQL to create all tables
/// NOTE: Revenue amounts stored as TEXT to preserve rust_decimal::Decimal precision
pub const CREATE_TABLES: &str = r#"
-- Platform accounts (founders and admins)
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL DEFAULT 'founder',
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Products listed on the community leaderboard
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    title TEXT NOT NULL,
    description TEXT,
    category TEXT NOT NULL DEFAULT 'other',
    status TEXT NOT NULL DEFAULT 'active',
    featured INTEGER NOT NULL DEFAULT 0,
    rating_average REAL NOT NULL DEFAULT 0,
    votes_count INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- One vote per (product, user); re-votes overwrite
CREATE TABLE IF NOT EXISTS product_votes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id INTEGER NOT NULL REFERENCES products(id),
    user_id INTEGER NOT NULL REFERENCES users(id),
    rating INTEGER NOT NULL,
    updated_at INTEGER DEFAULT (strftime('%s', 'now')),
    UNIQUE(product_id, user_id)
);

-- Append-only metric snapshots (metric_name: 'users' | 'revenue')
CREATE TABLE IF NOT EXISTS user_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    metric_name TEXT NOT NULL,
    value REAL NOT NULL DEFAULT 0,
    recorded_date TEXT NOT NULL,
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Self-reported weekly traction, one row per user per ISO week
CREATE TABLE IF NOT EXISTS weekly_traction (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    year INTEGER NOT NULL,
    week_number INTEGER NOT NULL,
    revenue_amount TEXT NOT NULL DEFAULT '0',
    new_users INTEGER NOT NULL DEFAULT 0,
    active_users INTEGER NOT NULL DEFAULT 0,
    churned_users INTEGER NOT NULL DEFAULT 0,
    strongest_signal TEXT,
    created_at INTEGER DEFAULT (strftime('%s', 'now')),
    UNIQUE(user_id, year, week_number)
);

-- Founder goals; only counts and recency feed the execution score
CREATE TABLE IF NOT EXISTS goals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    description TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    created_at INTEGER DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- AI-agent chat events; trailing-7-day count feeds the engagement score
CREATE TABLE IF NOT EXISTS agent_interactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    agent TEXT NOT NULL,
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_products_status ON products(status, category);
CREATE INDEX IF NOT EXISTS idx_products_rating ON products(rating_average DESC);
CREATE INDEX IF NOT EXISTS idx_votes_product ON product_votes(product_id);
CREATE INDEX IF NOT EXISTS idx_metrics_lookup ON user_metrics(user_id, metric_name, recorded_date DESC);
CREATE INDEX IF NOT EXISTS idx_traction_user ON weekly_traction(user_id, year DESC, week_number DESC);
CREATE INDEX IF NOT EXISTS idx_goals_user ON goals(user_id, status);
CREATE INDEX IF NOT EXISTS idx_interactions_user ON agent_interactions(user_id, created_at DESC)
"#;

/// ALTER TABLE migrations, run after table creation.
/// "duplicate column name" errors are tolerated on subsequent runs.
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE products ADD COLUMN url TEXT",
    "ALTER TABLE users ADD COLUMN avatar_url TEXT",
];
