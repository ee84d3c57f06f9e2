//! Sequential vs. concurrent awaiting of two independent delayed
//! computations. Purely pedagogical: the second timing shows both
//! delays overlapping under `tokio::join!`.

use std::time::{Duration, Instant};

use tokio::time::sleep;

async fn solve_math() -> i64 {
    sleep(Duration::from_secs(1)).await;
    2 + 3
}

async fn greet() -> &'static str {
    sleep(Duration::from_secs(2)).await;
    "Welcome to parallelization"
}

#[tokio::main]
async fn main() {
    let start = Instant::now();
    let greeting = greet().await;
    let sum = solve_math().await;
    println!("sequential: {greeting} / {sum} in {:.2?}", start.elapsed());

    let start = Instant::now();
    let (greeting, sum) = tokio::join!(greet(), solve_math());
    println!("concurrent: {greeting} / {sum} in {:.2?}", start.elapsed());
}
