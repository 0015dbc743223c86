//! Simple consumer example: one producer task, one reader

use std::time::Duration;
use stream_demux::{StreamDemux, StreamItem};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let demux: StreamDemux<String> = StreamDemux::new();
    let mut consumer = demux.create_consumer("hello", Some(Duration::from_secs(1)));

    let producer = demux.clone();
    tokio::spawn(async move {
        for i in 0..10 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            producer.write("hello", format!("world{}", i));
            producer.write("abc", format!("def{}", i));
        }
        producer.close("hello", None);
    });

    println!("Reading 'hello' (consumer {})...", consumer.id());
    loop {
        match consumer.next().await? {
            StreamItem::Value(value) => {
                println!("  DATA: {} (backlog {})", value, consumer.backpressure());
            }
            StreamItem::Done(_) => {
                println!("  stream closed");
                break;
            }
        }
    }

    println!("Live consumers left: {}", demux.get_consumer_count_all());
    Ok(())
}
