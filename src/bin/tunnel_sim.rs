//! 隧道仿真
//!
//! 搭建一个服务端和若干客户端，注入流量，运行后打印各端点的状态。

use std::process::ExitCode;

use clap::Parser;
use p2ptun_rs::net::Scenario;
use p2ptun_rs::sim::SimTime;

#[derive(Debug, Parser)]
#[command(name = "tunnel_sim", about = "以太网 over UDP 隧道仿真：服务端 + 多客户端")]
struct Args {
    /// JSON 场景文件；不给则使用内置示例
    #[arg(long)]
    scenario: Option<String>,
    #[arg(long, default_value_t = 2)]
    clients: usize,
    /// 每个方向注入的帧数
    #[arg(long, default_value_t = 10)]
    frames: u64,
    /// 下行帧的载荷字节数（超过分片阈值即被分片）
    #[arg(long, default_value_t = 3000)]
    payload_bytes: usize,
    /// 仿真运行到多少毫秒（覆盖场景中的 duration_ms）
    #[arg(long)]
    until_ms: Option<u64>,
    /// 以 JSON 输出
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> ExitCode {
    // 日志走 stderr，stdout 只留给报告
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();

    let scenario = match &args.scenario {
        Some(path) => Scenario::from_path(path),
        None => Scenario::demo(args.clients, args.frames, args.payload_bytes),
    };
    let mut scenario = match scenario {
        Ok(s) => s,
        Err(e) => {
            eprintln!("tunnel_sim: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(ms) = args.until_ms {
        scenario.duration_ms = ms;
    }

    let (world, report) = match scenario.run() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("tunnel_sim: {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("tunnel_sim: {e}");
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    let now = SimTime::from_millis(report.now_ms);
    println!("done @ {} ms", report.now_ms);
    println!(
        "datagrams: sent={} delivered={} lost={} no_route={}",
        report.world.datagrams_sent,
        report.world.datagrams_delivered,
        report.world.datagrams_lost,
        report.world.no_route
    );
    for (id, node) in world.nodes() {
        println!();
        println!("== node {} ({}, {}) ==", id.0, node.endpoint.role(), node.addr());
        print!("{}", node.endpoint.dump_info(now));
        println!("Received frames: {}", node.received.len());
    }
    ExitCode::SUCCESS
}
