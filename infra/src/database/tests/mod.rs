//! Database tests; the ones needing a live MySQL server are ignored by default
