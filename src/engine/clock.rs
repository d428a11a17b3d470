use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    thread,
    time::{Duration, SystemTime},
};

/// Источник времени и ожидания для цикла захвата блокировки.
///
/// Позволяет тестам управлять «возрастом» файла блокировки и не спать
/// по-настоящему.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Текущее время (сравнивается с ctime файла блокировки).
    fn now(&self) -> SystemTime;

    /// Приостанавливает вызывающего на `dur`.
    fn sleep(
        &self,
        dur: Duration,
    );
}

/// Системные часы и `thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

/// Ручные часы: время двигается только через [`ManualClock::advance`] или
/// вызов [`Clock::sleep`], который ничего не ждёт.
#[derive(Debug)]
pub struct ManualClock {
    base: SystemTime,
    offset_ms: AtomicU64,
    sleeps: AtomicU64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ManualClock {
    /// Часы, стартующие с текущего системного времени.
    pub fn starting_now() -> Self {
        Self::starting_at(SystemTime::now())
    }

    pub fn starting_at(base: SystemTime) -> Self {
        Self {
            base,
            offset_ms: AtomicU64::new(0),
            sleeps: AtomicU64::new(0),
        }
    }

    /// Сдвигает время вперёд.
    pub fn advance(
        &self,
        dur: Duration,
    ) {
        self.offset_ms
            .fetch_add(dur.as_millis() as u64, Ordering::SeqCst);
    }

    /// Сколько раз вызывался `sleep`.
    pub fn sleep_count(&self) -> u64 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(
        &self,
        dur: Duration,
    ) {
        thread::sleep(dur);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        self.base + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }

    fn sleep(
        &self,
        dur: Duration,
    ) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        self.advance(dur);
    }
}
