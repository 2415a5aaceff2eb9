//! Пул по умолчанию на весь процесс.
//!
//! Создается лениво при первом обращении и живет до конца процесса.
//! Аксессор сам пул никогда не останавливает: `shutdown` остается за вызывающим.
//! Чтобы подменить пул (тесты, встраивание), вызовите `install_global`
//! до первого обращения к `global`.

use super::{
    errors::PoolError,
    pool::{Config, ThreadPool},
};
use std::sync::OnceLock;

static GLOBAL: OnceLock<ThreadPool> = OnceLock::new();

/// Возвращает общий пул, при первом вызове строит его из `Config::from_env()`
pub fn try_global() -> Result<&'static ThreadPool, PoolError> {
    if let Some(pool) = GLOBAL.get() {
        return Ok(pool);
    }

    let pool = ThreadPool::with_config(Config::from_env())?;
    // Проигравший гонку пул просто дропнется и остановится
    Ok(GLOBAL.get_or_init(move || pool))
}

/// # Panics
///
/// Паникует, если ОС не дала создать потоки для пула.
pub fn global() -> &'static ThreadPool {
    match try_global() {
        Ok(pool) => pool,
        Err(err) => panic!("failed to start global thread pool: {err}"),
    }
}

/// Устанавливает свой пул как общий. Если общий пул уже создан,
/// переданный возвращается обратно в `Err`.
pub fn install_global(pool: ThreadPool) -> Result<(), ThreadPool> {
    GLOBAL.set(pool)
}

#[inline]
pub fn is_global_initialized() -> bool {
    GLOBAL.get().is_some()
}
