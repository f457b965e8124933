//! # Travel Approvals Example
//!
//! This example walks a two-stage approval process end to end:
//! - Registering a process definition
//! - Starting an instance that suspends on a user task
//! - Querying work items by role
//! - Claiming and completing tasks through the full lifecycle
//!
//! Run with: `cargo run --example approvals`

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use worklist_engine::ProcessEngine;
use worklist_types::{Principal, ProcessDefinition, ProcessNode, SecurityPolicy, UserTaskNode};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for observability
    tracing_subscriber::fmt::init();

    println!("📋 Worklist Engine - Travel Approvals Example\n");

    // Step 1: Register the approvals process
    println!("📦 Registering process definition...");
    let engine = ProcessEngine::new();
    let mut def = ProcessDefinition::new("approvals");
    def.add_node(ProcessNode::set_variable(
        "set-approver",
        "approver",
        json!("manager"),
    ))?;
    def.add_node(ProcessNode::user_task(
        "first-line",
        UserTaskNode::new("firstLineApproval")
            .with_potential_group("managers")
            .with_input("traveller", "traveller")
            .with_output("approved", "firstLineApproval"),
    ))?;
    def.add_node(ProcessNode::user_task(
        "second-line",
        UserTaskNode::new("secondLineApproval")
            .with_potential_user_from("approver")
            .with_potential_group("managers")
            .with_input("traveller", "traveller")
            .with_output("approved", "secondLineApproval"),
    ))?;
    let def_id = engine.register_definition(Arc::new(def))?;
    println!("✅ Definition registered: {}\n", def_id);

    // Step 2: Start an instance
    println!("🚀 Starting a process instance...");
    let traveller = json!({
        "firstName": "John",
        "lastName": "Doe",
        "email": "john.doe@example.com",
        "nationality": "American",
    });
    let vars = HashMap::from([("traveller".to_string(), traveller)]);
    let id = engine.create_instance(&def_id, vars).await?;
    engine.start(&id).await?;
    println!("✅ Instance started: {}\n", id);

    // Step 3: Query work items as a manager
    println!("🔍 Querying work items for the managers group...");
    let manager = SecurityPolicy::of(Principal::new("admin").with_role("managers"));
    let items = engine.work_items(&id, &manager).await?;
    for item in &items {
        println!("   • {} [{}]", item.name, item.state);
    }
    println!();

    // Step 4: Claim and complete the first approval
    println!("✍️  Working the first approval...");
    let task_id = items[0].id.clone();
    engine.claim(&task_id, &manager).await?;
    engine.start_task(&task_id, &manager).await?;
    engine
        .complete_work_item(
            &id,
            &task_id,
            HashMap::from([("approved".to_string(), json!(true))]),
            &manager,
        )
        .await?;
    println!("✅ First approval completed\n");

    // Step 5: The second task resolved its approver from a variable
    println!("🔍 Querying as the resolved approver...");
    let approver = SecurityPolicy::of(Principal::new("manager"));
    let items = engine.work_items(&id, &approver).await?;
    for item in &items {
        println!("   • {} [{}]", item.name, item.state);
    }
    let task_id = items[0].id.clone();
    engine
        .complete_work_item(
            &id,
            &task_id,
            HashMap::from([("approved".to_string(), json!(false))]),
            &approver,
        )
        .await?;
    println!("✅ Second approval completed\n");

    // Step 6: Inspect the archived result
    println!("📊 Final Process State:");
    println!("   • Status: {}", engine.status(&id).await?);
    for (name, value) in engine.variables(&id).await? {
        println!("   • {} = {}", name, value);
    }
    if let Some(record) = engine.completed_process(&id) {
        println!("   • Tasks completed: {}", record.tasks_completed());
        println!("   • Duration: {}s", record.duration_secs);
    }

    println!("\n🎉 Example completed successfully!");

    Ok(())
}
