//! Test-side waiting helpers: `poll(..).secs(5).expect("..").await` panics
//! with the message if the condition is still false at the deadline.

use std::future::{Future, IntoFuture};
use std::marker::PhantomData;
use std::pin::Pin;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_INTERVAL: Duration = Duration::from_millis(10);

/// Deadline and cadence shared by both waiters.
#[derive(Debug, Clone, Copy)]
struct Schedule<'a> {
    timeout: Duration,
    interval: Duration,
    msg: &'a str,
}

impl Default for Schedule<'_> {
    fn default() -> Self {
        Self { timeout: DEFAULT_TIMEOUT, interval: DEFAULT_INTERVAL, msg: "condition not met" }
    }
}

pub fn poll<'a, F: Fn() -> bool + 'a>(condition: F) -> WaitFor<'a, F> {
    WaitFor { condition, schedule: Schedule::default() }
}

pub struct WaitFor<'a, F> {
    condition: F,
    schedule: Schedule<'a>,
}

impl<'a, F: Fn() -> bool + 'a> WaitFor<'a, F> {
    pub fn secs(mut self, n: u64) -> Self {
        self.schedule.timeout = Duration::from_secs(n);
        self
    }

    pub fn millis(mut self, n: u64) -> Self {
        self.schedule.timeout = Duration::from_millis(n);
        self
    }

    pub fn every(mut self, interval: Duration) -> Self {
        self.schedule.interval = interval;
        self
    }

    pub fn expect(mut self, msg: &'a str) -> Self {
        self.schedule.msg = msg;
        self
    }
}

impl<'a, F: Fn() -> bool + 'a> IntoFuture for WaitFor<'a, F> {
    type Output = ();
    type IntoFuture = Pin<Box<dyn Future<Output = ()> + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        let Self { condition, schedule } = self;
        poll_async(move || std::future::ready(condition()))
            .with_schedule(schedule)
            .into_future()
    }
}

pub fn poll_async<'a, F, Fut>(condition: F) -> WaitForAsync<'a, F, Fut>
where
    F: FnMut() -> Fut + 'a,
    Fut: Future<Output = bool> + 'a,
{
    WaitForAsync { condition, schedule: Schedule::default(), _fut: PhantomData }
}

pub struct WaitForAsync<'a, F, Fut> {
    condition: F,
    schedule: Schedule<'a>,
    _fut: PhantomData<fn() -> Fut>,
}

impl<'a, F, Fut> WaitForAsync<'a, F, Fut>
where
    F: FnMut() -> Fut + 'a,
    Fut: Future<Output = bool> + 'a,
{
    pub fn secs(mut self, n: u64) -> Self {
        self.schedule.timeout = Duration::from_secs(n);
        self
    }

    pub fn millis(mut self, n: u64) -> Self {
        self.schedule.timeout = Duration::from_millis(n);
        self
    }

    pub fn every(mut self, interval: Duration) -> Self {
        self.schedule.interval = interval;
        self
    }

    pub fn expect(mut self, msg: &'a str) -> Self {
        self.schedule.msg = msg;
        self
    }

    fn with_schedule(mut self, schedule: Schedule<'a>) -> Self {
        self.schedule = schedule;
        self
    }
}

impl<'a, F, Fut> IntoFuture for WaitForAsync<'a, F, Fut>
where
    F: FnMut() -> Fut + 'a,
    Fut: Future<Output = bool> + 'a,
{
    type Output = ();
    type IntoFuture = Pin<Box<dyn Future<Output = ()> + 'a>>;

    fn into_future(mut self) -> Self::IntoFuture {
        Box::pin(async move {
            let Schedule { timeout, interval, msg } = self.schedule;
            let deadline = tokio::time::Instant::now() + timeout;
            while !(self.condition)().await {
                assert!(tokio::time::Instant::now() < deadline, "timeout after {timeout:?}: {msg}");
                tokio::time::sleep(interval).await;
            }
        })
    }
}
