pub const SCHEMA: &str = r#"
-- deduplicated strings: metadata names, contents, languages and keywords
CREATE TABLE IF NOT EXISTS string (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    value TEXT NOT NULL UNIQUE
);

-- research areas, keyed by the site's subject code
CREATE TABLE IF NOT EXISTS area (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);

-- authors and collaborators, keyed by profile slug
CREATE TABLE IF NOT EXISTS author (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    title TEXT,
    grade TEXT,
    field TEXT,
    specialty TEXT
);

-- distinct (name, content, lang) metadata triples, as string ids
CREATE TABLE IF NOT EXISTS meta (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name INTEGER NOT NULL REFERENCES string(id),
    content INTEGER NOT NULL REFERENCES string(id),
    lang INTEGER REFERENCES string(id)
);

CREATE INDEX IF NOT EXISTS idx_meta_name_content ON meta(name, content);

-- publications; authors/collabs/tags/meta are comma-separated id lists
CREATE TABLE IF NOT EXISTS pub (
    id TEXT PRIMARY KEY,
    area INTEGER NOT NULL REFERENCES area(id),
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    date TEXT NOT NULL,
    authors TEXT NOT NULL,
    collabs TEXT NOT NULL,
    tags TEXT NOT NULL,
    meta TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pub_area ON pub(area);
"#;
