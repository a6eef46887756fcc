//! Sync-loop walkthrough: polling, opening a conversation, debounced search.
//!
//! Run with: cargo run --example sync_demo

use std::sync::Arc;
use std::time::Duration;

use quadchat::{
    search_with_fallback, ChatBackend, ChatCore, Debouncer, MessageType, RequestAction, Result,
    SyncConfig, SyncEvent, SyncLoop,
};

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== quadchat sync demo ===\n");

    // 1. Set up two friends with some traffic
    println!("1. Setting up Alice and Bob...");
    let core = ChatCore::open(None)?;
    let alice = core.directory.register("Alice", "alice@campus.edu")?;
    let bob = core.directory.register("Bob", "bob@campus.edu")?;
    let request = core.requests.send_request(&bob.id, &alice.id, None)?;
    core.requests
        .respond(&request.id, &alice.id, RequestAction::Accept)?;
    core.messages.send(&bob.id, &alice.id, "Lunch today?", MessageType::Text)?;
    core.messages.send(&bob.id, &alice.id, "There's a new place on 5th", MessageType::Text)?;

    // 2. Start the sync loop for Alice with fast demo intervals
    println!("2. Starting sync loop for Alice...");
    let core = Arc::new(core);
    let backend: Arc<dyn ChatBackend> = core.clone();
    let config = SyncConfig {
        message_interval: Duration::from_millis(200),
        roster_interval: Duration::from_millis(500),
        search_debounce: Duration::from_millis(50),
    };
    let (handle, mut events) = SyncLoop::spawn(backend, alice.id.clone(), config);

    // 3. The first roster poll lands immediately
    println!("3. Waiting for the first roster poll...");
    while let Some(event) = events.recv().await {
        match event {
            SyncEvent::Conversations(list) => {
                for conversation in &list {
                    println!(
                        "   {} — {} unread",
                        conversation.friend.display_name, conversation.unread_count
                    );
                }
                break;
            }
            SyncEvent::PendingRequests(list) => {
                println!("   {} pending requests", list.len());
            }
            SyncEvent::Messages { .. } => {}
        }
    }

    // 4. Open the conversation: history arrives and it is marked read
    println!("\n4. Alice opens the conversation with Bob...");
    let history = handle.open_conversation(&bob.id).await?;
    for message in &history {
        println!("   Bob: {}", message.content);
    }
    println!(
        "   Unread after open: {}",
        core.messages.unread_count(&alice.id, &bob.id)?
    );

    // 5. New traffic shows up on the next message poll
    println!("\n5. Bob sends another message; waiting for the poll...");
    core.messages.send(&bob.id, &alice.id, "Meet at noon?", MessageType::Text)?;
    while let Some(event) = events.recv().await {
        if let SyncEvent::Messages { messages, .. } = event {
            if let Some(last) = messages.last() {
                if last.content == "Meet at noon?" {
                    println!("   Poll delivered: \"{}\"", last.content);
                    break;
                }
            }
        }
    }
    // Background polls never mark read; the new message stays unread
    println!(
        "   Unread after poll: {}",
        core.messages.unread_count(&alice.id, &bob.id)?
    );

    // 6. Debounced search: only the last keystroke of a burst runs
    println!("\n6. Typing 'b', 'bo', 'bob@campus' quickly...");
    let debouncer = Debouncer::new(Duration::from_millis(50));
    for partial in ["b", "bo", "bob@campus"] {
        let core = core.clone();
        let viewer = alice.id.clone();
        let query = partial.to_string();
        debouncer.call(async move {
            match search_with_fallback(core.as_ref(), &viewer, &query).await {
                Ok(users) => {
                    for user in users {
                        println!(
                            "   Search '{}' found: {} <{}>",
                            query, user.display_name, user.email
                        );
                    }
                }
                Err(e) => println!("   Search '{}' failed: {}", query, e),
            }
        });
    }
    tokio::time::sleep(Duration::from_millis(150)).await;

    // 7. Shut down
    println!("\n7. Shutting down the sync loop...");
    handle.close_conversation();
    handle.shutdown();

    println!("\n=== demo complete ===");
    Ok(())
}
