//! Behaviour tests for reply linkage and thread generation using Cucumber.
//!
//! Everything runs in-process against simulated relays:
//!
//! ```bash
//! cargo test --test threading
//! ```

mod steps;

use cucumber::World;
use steps::generation::GenerationWorld;
use steps::linkage::LinkageWorld;

#[tokio::main]
async fn main() {
    println!("\n=== Running Reply Linkage Tests ===\n");
    LinkageWorld::cucumber()
        .fail_on_skipped()
        .run("tests/threading/features/reply_linkage.feature")
        .await;

    println!("\n=== Running Thread Generation Tests ===\n");
    GenerationWorld::cucumber()
        .fail_on_skipped()
        .run("tests/threading/features/thread_generation.feature")
        .await;
}
