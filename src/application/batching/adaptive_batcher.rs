use std::collections::VecDeque;
use std::sync::Mutex;

use crate::domain::models::{estimate_tokens, Chunk};

const TARGET_RESPONSE_MS: f64 = 2000.0;
const TOLERANCE: f64 = 0.15;
const STABILITY_THRESHOLD: u32 = 3;
const ADAPTATION_RATE: f64 = 1.0;
const HISTORY_LEN: usize = 3;

/// Packs a stream of chunks into provider-sized batches and adapts the
/// batch size from observed latency (spec §4.G).
pub struct AdaptiveBatcher {
    min: usize,
    max: usize,
    max_tokens_per_request: u32,
    state: Mutex<BatcherState>,
}

struct BatcherState {
    current: usize,
    history: VecDeque<f64>,
    slow: u32,
    fast: u32,
    stable: u32,
    last_throughput: Option<f64>,
}

/// Outcome of packing: the batches to dispatch plus any chunks that had to
/// be skipped because a single chunk exceeded the provider's token cap.
pub struct PackResult {
    pub batches: Vec<Vec<Chunk>>,
    pub skipped: Vec<Chunk>,
}

impl AdaptiveBatcher {
    pub fn new(min: usize, max: usize, initial: usize, max_tokens_per_request: u32) -> Self {
        let current = initial.clamp(min.max(1), max.max(min.max(1)));
        Self {
            min: min.max(1),
            max: max.max(min.max(1)),
            max_tokens_per_request,
            state: Mutex::new(BatcherState {
                current,
                history: VecDeque::with_capacity(HISTORY_LEN),
                slow: 0,
                fast: 0,
                stable: 0,
                last_throughput: None,
            }),
        }
    }

    pub fn current_batch_size(&self) -> usize {
        self.state.lock().unwrap().current
    }

    /// Packs chunks into batches bounded by the current batch size and the
    /// provider's token cap. A chunk whose own token estimate exceeds the
    /// cap is skipped, never split across batches.
    pub fn pack(&self, chunks: Vec<Chunk>) -> PackResult {
        let batch_size = self.current_batch_size();
        let mut batches = Vec::new();
        let mut skipped = Vec::new();
        let mut current_batch = Vec::new();
        let mut current_tokens = 0u32;

        for chunk in chunks {
            let tokens = estimate_tokens(chunk.content());
            if tokens > self.max_tokens_per_request {
                skipped.push(chunk);
                continue;
            }
            let would_exceed_tokens = current_tokens + tokens > self.max_tokens_per_request;
            let would_exceed_count = current_batch.len() >= batch_size;
            if (would_exceed_tokens || would_exceed_count) && !current_batch.is_empty() {
                batches.push(std::mem::take(&mut current_batch));
                current_tokens = 0;
            }
            current_tokens += tokens;
            current_batch.push(chunk);
        }
        if !current_batch.is_empty() {
            batches.push(current_batch);
        }

        PackResult { batches, skipped }
    }

    /// Feeds back the observed response time (ms) and throughput (items/sec)
    /// for one completed batch, adapting `current_batch_size` (spec §4.G).
    pub fn record_response(&self, response_time_ms: f64, throughput: f64, rate_limited: bool) {
        let mut state = self.state.lock().unwrap();

        if rate_limited {
            state.current = (state.current / 2).max(self.min);
            state.slow = 0;
            state.fast = 0;
            state.stable = 0;
            state.history.clear();
            return;
        }

        if state.history.len() >= HISTORY_LEN {
            state.history.pop_front();
        }
        state.history.push_back(response_time_ms);
        let avg = state.history.iter().sum::<f64>() / state.history.len() as f64;

        if avg > TARGET_RESPONSE_MS * (1.0 + TOLERANCE) {
            state.slow += 1;
            state.fast = 0;
            if state.slow >= STABILITY_THRESHOLD {
                let factor = (1.0 - (avg - TARGET_RESPONSE_MS) / TARGET_RESPONSE_MS * ADAPTATION_RATE).max(0.5);
                state.current = ((state.current as f64 * factor).floor() as usize).max(self.min);
                state.slow = 0;
            }
        } else if avg < TARGET_RESPONSE_MS * (1.0 - TOLERANCE)
            && state.last_throughput.map(|prev| throughput >= prev).unwrap_or(true)
        {
            state.fast += 1;
            state.slow = 0;
            if state.fast >= STABILITY_THRESHOLD {
                let factor = (1.0 + (TARGET_RESPONSE_MS - avg) / TARGET_RESPONSE_MS * ADAPTATION_RATE).min(1.3);
                state.current = ((state.current as f64 * factor).floor() as usize).min(self.max);
                state.fast = 0;
            }
        } else {
            state.stable += 1;
            state.slow = 0;
            state.fast = 0;
        }

        state.current = state.current.clamp(self.min, self.max);
        state.last_throughput = Some(throughput);
    }
}
