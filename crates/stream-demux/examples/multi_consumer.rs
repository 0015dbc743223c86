//! Multi-consumer example showing fan-out, backpressure and kill

use futures::StreamExt;
use std::time::Duration;
use stream_demux::StreamDemux;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let demux: StreamDemux<u32> = StreamDemux::new();
    let jobs = demux.stream("jobs");

    // Two independent passes over the same stream
    let fast = jobs.iter();
    let mut slow = jobs.consumer();

    println!("Publishing 10 jobs...");
    for i in 0..10 {
        jobs.write(i);
    }

    println!("\n--- Consumer Status ---");
    for stats in jobs.get_consumer_stats_list() {
        println!("{}", serde_json::to_string(&stats)?);
    }
    println!("Worst backlog on 'jobs': {}", jobs.get_backpressure());

    // Slow consumer handles half, then gets killed
    for _ in 0..5 {
        let item = slow.next().await?;
        println!("  slow processed {:?}", item.value());
    }
    println!("slow backlog after 5 reads: {}", slow.backpressure());

    demux.kill_consumer(slow.id(), Some(u32::MAX));
    println!("slow final item: {:?}", slow.next().await?);

    // Fast consumer drains everything once the stream closes
    jobs.close(None);
    let all: Vec<u32> = fast
        .map(|v| v.expect("no timeout configured"))
        .collect()
        .await;
    println!("fast processed {} jobs: {:?}", all.len(), all);

    // A late once() with nothing to read times out
    match jobs.once(Some(Duration::from_millis(50))).await {
        Ok(value) => println!("unexpected value {:?}", value),
        Err(e) => println!("once: {}", e),
    }

    Ok(())
}
