//! A small end-to-end pipeline mixing sync and async units with a fan-out.
//!
//! Run with: `cargo run --example basic_pipeline`

use confluence::prelude::*;
use serde_json::json;
use std::time::Duration;

fn main() -> Result<(), TransformError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("failed to build runtime");

    let normalize = Node::new(
        "Normalize",
        Signature::new(Type::concrete("str"), Type::concrete("str")),
        |input: NodeValue| {
            let text = input.as_str().unwrap_or_default().trim().to_lowercase();
            Ok(json!(text))
        },
    );

    let fetch_score = Node::from_future_fn(
        "FetchScore",
        Signature::new(Type::concrete("str"), Type::concrete("int")),
        |input| {
            Box::pin(async move {
                // Stands in for a remote lookup.
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(json!(input.as_str().unwrap_or_default().len() as i64))
            })
        },
    );

    let double = Node::new(
        "Double",
        Signature::new(Type::concrete("int"), Type::concrete("int")),
        |input: NodeValue| Ok(json!(input.as_i64().unwrap_or(0) * 2)),
    );

    let describe = Node::new(
        "Describe",
        Signature::new(Type::concrete("int"), Type::concrete("str")),
        |input: NodeValue| Ok(json!(format!("score: {input}"))),
    );

    let pipeline = normalize >> fetch_score >> (double, describe);
    println!("pipeline: {pipeline}");
    println!("units: {}", pipeline.unit_count());

    let result = runtime.block_on(pipeline.transform_async(json!("  Hello Confluence  ")))?;
    println!("result: {result}");
    Ok(())
}
