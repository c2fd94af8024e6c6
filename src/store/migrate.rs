use crate::store::keys;
use crate::store::{Store, StoreError};
use crate::survey::lexicon::RankedWord;

const VERSION_KEY: &str = "_meta:version";

struct Migration {
    name: &'static str,
    apply: fn(&Store) -> Result<(), StoreError>,
}

/// Version N is `MIGRATIONS[N - 1]`; append only.
const MIGRATIONS: &[Migration] = &[
    Migration { name: "001_initial", apply: initial },
    Migration { name: "002_lexicon_rank_keys", apply: rekey_lexicon_by_rank },
];

pub fn latest_version() -> u32 {
    MIGRATIONS.len() as u32
}

/// 执行所有未应用的数据库迁移。
///
/// 每个迁移必须幂等：进程可能在迁移完成后、写入版本号前崩溃，重启后会再次执行。
/// 版本号在每个迁移成功后立即持久化，且只能前进。
pub fn run(store: &Store) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    if current > latest_version() {
        tracing::warn!(current, latest = latest_version(), "Store was written by a newer build");
        return Ok(());
    }

    for (version, migration) in (1u32..).zip(MIGRATIONS).skip(current as usize) {
        tracing::info!(version, name = migration.name, "Running migration");
        (migration.apply)(store)?;
        set_version(store, version)?;
    }
    Ok(())
}

pub fn get_current_version(store: &Store) -> Result<u32, StoreError> {
    match store.meta.get(VERSION_KEY.as_bytes())? {
        Some(raw) => {
            let bytes: [u8; 4] = raw.as_ref().try_into().map_err(|_| StoreError::Migration {
                version: 0,
                message: format!("corrupt schema version ({} bytes)", raw.len()),
            })?;
            Ok(u32::from_be_bytes(bytes))
        }
        None => Ok(0),
    }
}

pub fn set_version(store: &Store, version: u32) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    if version < current {
        return Err(StoreError::Migration {
            version,
            message: format!("Refuse to downgrade from {} to {}", current, version),
        });
    }

    store.meta.insert(VERSION_KEY.as_bytes(), &version.to_be_bytes())?;
    Ok(())
}

fn initial(_store: &Store) -> Result<(), StoreError> {
    Ok(())
}

/// Early imports keyed lexicon words by bare id. Re-key them by rank so a
/// scan yields rank order.
fn rekey_lexicon_by_rank(store: &Store) -> Result<(), StoreError> {
    let mut rekeyed = 0usize;
    for item in store.lexicon_words.iter() {
        let (key, value) = item?;
        let word: RankedWord = Store::deserialize(&value)?;
        let expected = keys::lexicon_word_key(word.rank, &word.id)?;
        if key.as_ref() != expected.as_bytes() {
            store.lexicon_words.insert(expected.as_bytes(), value.clone())?;
            store.lexicon_words.remove(&key)?;
            rekeyed += 1;
        }
    }
    if rekeyed > 0 {
        tracing::info!(rekeyed, "Lexicon words re-keyed by rank");
    }
    Ok(())
}
