//! Server, client and retry configuration.

use std::time::Duration;

use hydra_core::PostId;
use hydra_proto::limits;

/// Configuration for a [`Server`](crate::Server).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Instance name, recorded on the server's tracing span.
    pub name: String,
    /// Log protocol traffic at info level instead of debug.
    pub trace_messages: bool,
    /// Capacity of the command channel.
    pub command_capacity: usize,
    /// Capacity of the ingestion channel.
    pub sink_capacity: usize,
}

impl ServerConfig {
    /// Creates a configuration with the given instance name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trace_messages: false,
            command_capacity: 64,
            sink_capacity: 1000,
        }
    }

    /// Sets message tracing.
    pub fn with_trace_messages(mut self, trace: bool) -> Self {
        self.trace_messages = trace;
        self
    }

    /// Sets the ingestion channel capacity.
    pub fn with_sink_capacity(mut self, capacity: usize) -> Self {
        self.sink_capacity = capacity.max(1);
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("hydra")
    }
}

/// Configuration for a [`HydraClient`](crate::HydraClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Instance name, recorded on the client's tracing span.
    pub name: String,
    /// Log protocol traffic at info level instead of debug.
    pub trace_messages: bool,
    /// Octets requested per FETCH_CHUNK.
    pub chunk_size: u64,
    /// How long to wait for any reply before the connection counts as lost.
    pub request_timeout: Duration,
    /// Idle time before a PING is sent.
    pub heartbeat: Duration,
    /// Backoff between connection attempts.
    pub retry: RetryConfig,
    /// Also fetch posts older than the held range.
    pub fetch_older: bool,
    /// Capacity of the event channel.
    pub event_capacity: usize,
    /// Oldest post already held, e.g. restored from the client's own store.
    pub oldest: Option<PostId>,
    /// Newest post already held.
    pub newest: Option<PostId>,
}

impl ClientConfig {
    /// Creates a configuration with the given instance name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trace_messages: false,
            chunk_size: 64 * 1024,
            request_timeout: Duration::from_secs(10),
            heartbeat: Duration::from_secs(5),
            retry: RetryConfig::default(),
            fetch_older: true,
            event_capacity: 1024,
            oldest: None,
            newest: None,
        }
    }

    /// Sets message tracing.
    pub fn with_trace_messages(mut self, trace: bool) -> Self {
        self.trace_messages = trace;
        self
    }

    /// Sets the chunk size, clamped to what the protocol allows.
    pub fn with_chunk_size(mut self, octets: u64) -> Self {
        self.chunk_size = octets.clamp(1, limits::MAX_CHUNK_OCTETS);
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the heartbeat interval.
    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = interval;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets whether older posts are fetched.
    pub fn with_fetch_older(mut self, fetch_older: bool) -> Self {
        self.fetch_older = fetch_older;
        self
    }

    /// Sets the event channel capacity (at least 1).
    ///
    /// Fetching pauses while this many unread events are queued.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Sets the range of posts already held.
    pub fn with_range(mut self, oldest: PostId, newest: PostId) -> Self {
        self.oldest = Some(oldest);
        self.newest = Some(newest);
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("hydra-client")
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a retry configuration starting at the given delay.
    pub fn new(initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets whether jitter is added.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Calculates the delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Up to 25% extra.
            let jitter = delay_secs * 0.25 * rand::random::<f64>();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}
