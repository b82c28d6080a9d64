//! Note text and participant names.

use rand::Rng;

const NAMES: &[&str] = &[
    "Alice", "Bob", "Carol", "Dave", "Erin", "Frank", "Grace", "Heidi", "Ivan", "Judy",
];

const TOPICS: &[&str] = &[
    "relay redundancy",
    "running a personal relay",
    "zaps for small creators",
    "key management on mobile",
    "outbox model adoption",
    "long-form notes",
    "spam filtering without central moderation",
    "client-side threading",
];

const OPENERS: &[&str] = &[
    "What does everyone think about",
    "Hot take on",
    "Been experimenting with",
    "Can someone explain",
    "Starting a thread about",
];

const REPLIES: &[&str] = &[
    "Agreed, that matches what I've seen.",
    "I'm not sure. It depends a lot on which relays you use.",
    "Interesting point! Do you have numbers on that?",
    "I tried this last week and it mostly worked.",
    "Counterpoint: most users never change the defaults.",
    "This is why I run my own relay.",
    "Good question, following.",
    "The NIPs cover some of this, the clients less so.",
    "Strongly disagree, but I see where you're coming from.",
    "+1, would love to see more of this.",
];

/// Display name for participant `index`; unique across any count.
pub fn participant_name(index: usize) -> String {
    let base = NAMES[index % NAMES.len()];
    match index / NAMES.len() {
        0 => base.to_string(),
        round => format!("{} {}", base, round + 1),
    }
}

/// Seeded source of root and reply text.
pub struct ContentGenerator<R> {
    rng: R,
}

impl<R: Rng> ContentGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Text for the root of thread number `thread` (0-based).
    pub fn root(&mut self, thread: usize) -> String {
        let opener = self.pick(OPENERS);
        let topic = self.pick(TOPICS);
        format!("{} {}? (thread #{})", opener, topic, thread + 1)
    }

    pub fn reply(&mut self) -> String {
        self.pick(REPLIES).to_string()
    }

    fn pick(&mut self, items: &[&'static str]) -> &'static str {
        items[self.rng.random_range(0..items.len())]
    }
}
