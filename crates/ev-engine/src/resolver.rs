//! Merging and ordering of the known migration set.

use crate::migration::SharedMigration;

/// Registered and discovered migrations merged into ascending version order.
pub struct ResolvedMigrations {
    migrations: Vec<SharedMigration>,
    target: Option<i32>,
}

impl ResolvedMigrations {
    /// Highest known version, or `None` for an empty set.
    pub fn target(&self) -> Option<i32> {
        self.target
    }

    /// Migrations in ascending version order.
    pub fn iter(&self) -> impl Iterator<Item = &SharedMigration> {
        self.migrations.iter()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn versions(&self) -> Vec<i32> {
        self.migrations.iter().map(|m| m.version()).collect()
    }
}

/// Merge `registered` with `discovered` and sort ascending by version.
///
/// Duplicate versions are kept (and logged); version uniqueness is the
/// caller's responsibility. The target is the maximum version, computed
/// directly rather than read off an end of the sorted list.
pub fn resolve(
    registered: &[SharedMigration],
    discovered: Vec<SharedMigration>,
) -> ResolvedMigrations {
    let mut migrations: Vec<SharedMigration> =
        Vec::with_capacity(registered.len() + discovered.len());
    migrations.extend(registered.iter().cloned());
    migrations.extend(discovered);
    migrations.sort_by_key(|m| m.version());

    for pair in migrations.windows(2) {
        if pair[0].version() == pair[1].version() {
            log::warn!(
                "Duplicate migration version {}: '{}' and '{}'",
                pair[0].version(),
                pair[0].description(),
                pair[1].description()
            );
        }
    }

    let target = migrations.iter().map(|m| m.version()).max();
    ResolvedMigrations { migrations, target }
}
