//! Run one analysis against the configured provider
//!
//! ```sh
//! GEMINI_API_KEY=... cargo run --example analyze_opportunities -- 3000000 "Santiago, Chile"
//! ```

use std::env;

use opportunity_pipeline::{orchestrator_from_env, AnalyzeRequest, Category, Request};

#[tokio::main]
async fn main() {
    env_logger::init();

    let mut args = env::args().skip(1);
    let investment_amount = args
        .next()
        .and_then(|raw| raw.parse::<f64>().ok())
        .unwrap_or(50_000.0);
    let location = args.next().unwrap_or_else(|| "Chile".to_string());

    let orchestrator = match orchestrator_from_env() {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            eprintln!("Configuration error: {}", err);
            std::process::exit(1);
        }
    };

    let request = Request::Analyze(AnalyzeRequest {
        investment_amount,
        location,
        category: Category::Products,
    });

    match orchestrator.run(&request).await {
        Ok(output) => match output.into_analysis() {
            Some(result) => {
                println!("{}\n", result.market_overview);
                for opportunity in &result.opportunities {
                    println!(
                        "- {} ({}{} | ROI {} | {:?})",
                        opportunity.title,
                        result.currency_symbol,
                        opportunity.initial_investment,
                        opportunity.expected_roi,
                        opportunity.difficulty
                    );
                }
                for source in &result.sources {
                    println!("  fuente: {} <{}>", source.title, source.uri);
                }
            }
            None => eprintln!("Unexpected output for an analyze request"),
        },
        Err(err) => {
            eprintln!("{} [{}]", err.user_message(), err.kind);
            if err.retriable {
                eprintln!("The request can be retried.");
            }
            std::process::exit(2);
        }
    }
}
