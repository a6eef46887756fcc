//! End-to-end walkthrough of the friendship and messaging flow.
//!
//! Run with: cargo run --example chat_demo

use quadchat::{ChatCore, MessageType, RequestAction, Result, DEFAULT_REQUEST_MESSAGE};

fn main() -> Result<()> {
    println!("=== quadchat demo ===\n");

    let core = ChatCore::open(None)?;

    // 1. Register some users
    println!("1. Registering users...");
    let alice = core.directory.register("Alice", "alice@campus.edu")?;
    let bob = core.directory.register("Bob", "bob@campus.edu")?;
    let cara = core.directory.register("Cara", "cara@campus.edu")?;
    println!("   Alice: {}", alice.id);
    println!("   Bob:   {}", bob.id);
    println!("   Cara:  {}\n", cara.id);

    // 2. Search the directory
    println!("2. Searching for 'bob'...");
    for user in core.directory.search("bob")? {
        println!("   Found: {} <{}>", user.display_name, user.email);
    }
    println!();

    // 3. Send friend requests
    println!("3. Alice sends friend requests...");
    let to_bob = core
        .requests
        .send_request(&alice.id, &bob.id, Some(DEFAULT_REQUEST_MESSAGE))?;
    let to_cara = core.requests.send_request(&alice.id, &cara.id, None)?;
    println!("   -> Bob:  {} ({})", to_bob.id, to_bob.status.as_str());
    println!("   -> Cara: {} ({})\n", to_cara.id, to_cara.status.as_str());

    // 4. Bob checks his inbox and accepts
    println!("4. Bob's pending requests:");
    for request in core.requests.pending_received(&bob.id)? {
        println!(
            "   {} from {} — \"{}\"",
            request.id,
            request.sender_id,
            request.message.as_deref().unwrap_or("(no message)")
        );
    }
    let outcome = core
        .requests
        .respond(&to_bob.id, &bob.id, RequestAction::Accept)?;
    println!("   Bob accepted; friendship: {:?}\n", outcome.friendship.is_some());

    // 5. Cara rejects
    println!("5. Cara rejects her request...");
    core.requests
        .respond(&to_cara.id, &cara.id, RequestAction::Reject)?;
    println!(
        "   Alice and Cara friends? {}\n",
        core.graph.are_friends(&alice.id, &cara.id)?
    );

    // 6. Messaging between friends
    println!("6. Alice and Bob chat...");
    core.messages.send(&alice.id, &bob.id, "Hey Bob!", MessageType::Text)?;
    core.messages.send(&bob.id, &alice.id, "Hey Alice, what's up?", MessageType::Text)?;
    core.messages.send(&alice.id, &bob.id, "Studying for finals. You?", MessageType::Text)?;

    for message in core.messages.list_between(&alice.id, &bob.id)? {
        let who = if message.sender_id == alice.id { "Alice" } else { "Bob" };
        println!("   [{}] {}: {}", message.seq, who, message.content);
    }
    println!();

    // 7. Bob's conversation view
    println!("7. Bob's conversations:");
    for conversation in core.conversations.list_conversations(&bob.id)? {
        println!(
            "   {} — {} unread, last: \"{}\"",
            conversation.friend.display_name,
            conversation.unread_count,
            conversation
                .last_message
                .map(|m| m.content)
                .unwrap_or_else(|| "(none)".to_string())
        );
    }

    // 8. Bob reads the conversation
    println!("\n8. Bob marks it read...");
    core.messages.mark_read(&bob.id, &alice.id)?;
    let unread = core.messages.unread_count(&bob.id, &alice.id)?;
    println!("   Unread from Alice: {}", unread);

    // 9. Conversations serialize cleanly for an API layer
    println!("\n9. Bob's inbox as JSON:");
    let inbox = core.conversations.list_conversations(&bob.id)?;
    println!("{}", serde_json::to_string_pretty(&inbox)?);

    println!("\n=== demo complete ===");
    Ok(())
}
