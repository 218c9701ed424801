use crate::utils::normalize_url;
use std::collections::{HashSet, VecDeque};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Low,
}

/// Pending URLs of one site. High priority URLs are a stack (most recently
/// discovered first), low priority ones a FIFO queue. A URL is handed out at
/// most once per run.
#[derive(Debug, Default)]
pub struct Frontier {
    high: Vec<Url>,
    low: VecDeque<Url>,
    known: HashSet<String>,
    visited: HashSet<String>,
}

impl Frontier {
    /// Seeds go in as high priority and come out in the given order.
    pub fn seeded(seeds: &[Url]) -> Self {
        let mut frontier = Frontier::default();
        for seed in seeds.iter().rev() {
            frontier.push(seed.clone(), Priority::High);
        }
        frontier
    }

    /// Returns false when the URL was already queued or visited.
    pub fn push(&mut self, url: Url, priority: Priority) -> bool {
        if !self.known.insert(normalize_url(&url)) {
            return false;
        }
        match priority {
            Priority::High => self.high.push(url),
            Priority::Low => self.low.push_back(url),
        }
        true
    }

    /// Next URL to visit, marked visited on the way out.
    pub fn pop(&mut self) -> Option<Url> {
        let url = self.high.pop().or_else(|| self.low.pop_front())?;
        self.visited.insert(normalize_url(&url));
        Some(url)
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(&normalize_url(url))
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn len(&self) -> usize {
        self.high.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.high.is_empty() && self.low.is_empty()
    }
}
