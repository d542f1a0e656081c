// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # imagecurry 服务端入口
//!
//! 负责进程级的启动工作：
//! - 初始化 log4rs 日志
//! - 加载 TOML 配置并按配置构建 tokio 运行时
//! - 创建存储根目录、绑定监听端口（失败即退出）
//! - 启动后台压缩 worker 与运维控制台
//! - 在 SIGINT / SIGTERM / `stop` 指令到来时停止接收新连接

use imagecurry::{AccessLog, CompressionTrigger, CompressorSettings, Config, Server};

use log::{error, info, warn, Level};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpListener,
    runtime::Builder,
    sync::Notify,
};

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    process,
    sync::{atomic::Ordering, Arc},
};

const LOG_CONFIG: &str = "config/log4rs.yaml";
const DEFAULT_CONFIG: &str = "config/development.toml";

fn main() {
    // 1. 初始化日志系统
    if let Err(e) = log4rs::init_file(LOG_CONFIG, Default::default()) {
        eprintln!("无法从{}初始化日志系统：{}", LOG_CONFIG, e);
        process::exit(1);
    }

    // 2. 加载配置，路径可由第一个命令行参数覆盖
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = Config::from_toml(&config_path);
    info!("配置文件{}已载入", config_path);

    // 3. 根据配置的工作线程数构建运行时
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("无法构建tokio运行时：{}", e);
            process::exit(1);
        }
    };

    let code = runtime.block_on(run(config));
    process::exit(code);
}

async fn run(config: Config) -> i32 {
    let access_log = AccessLog::global();
    let compressor = CompressionTrigger::spawn(CompressorSettings::from_config(&config), access_log);

    let port = config.port();
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    let socket = SocketAddrV4::new(address, port);

    let server = Server::new(config, Arc::new(compressor.clone()), access_log);

    // 4. 存储根目录不可用时无法提供服务
    if let Err(e) = server.prepare().await {
        error!("无法准备存储目录：{}", e);
        access_log.system(Level::Error, &format!("Failed to prepare storage roots: {}", e));
        return 1;
    }

    // 5. 绑定端口
    let listener = match TcpListener::bind(socket).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            access_log.system(Level::Error, &format!("Failed to bind {}: {}", socket, e));
            return 1;
        }
    };
    info!("服务端将在{}上监听Socket连接", socket);
    access_log.system(Level::Info, &format!("Server listening on {}", socket));

    // 6. 运维控制台
    let stop = Arc::new(Notify::new());
    tokio::spawn(console(
        Arc::clone(&stop),
        server.active_connection(),
        compressor.clone(),
    ));

    // 7. 主事件循环
    server.serve(listener, shutdown_signal(stop)).await;

    access_log.system(Level::Info, "Server stopped");
    info!("服务器已停止");
    0
}

/// 后台管理控制台，从标准输入读取指令。
async fn console(
    stop: Arc<Notify>,
    active_connection: Arc<std::sync::atomic::AtomicUsize>,
    compressor: CompressionTrigger,
) {
    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut input = String::new();
    loop {
        input.clear();
        match reader.read_line(&mut input).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("读取控制台输入失败：{}", e);
                break;
            }
        }
        let cmd = input.trim();
        match cmd {
            "stop" => {
                println!("停机指令已激活，服务器将停止接收新连接...");
                stop.notify_one();
                break;
            }
            "help" => {
                println!("== imagecurry Help ==");
                println!("stop   - 发出停机信号");
                println!("status - 查看当前服务器运行状态");
                println!("help   - 显示此帮助信息");
                println!("=====================");
            }
            "status" => {
                println!("== imagecurry 状态 ==");
                println!("当前活跃连接数: {}", active_connection.load(Ordering::SeqCst));
                println!("已提交压缩任务: {}", compressor.submitted());
                println!("=====================");
            }
            "" => {}
            _ => {
                println!("无效的命令：{}", cmd);
            }
        }
    }
}

/// SIGINT、SIGTERM 或控制台 `stop` 任意一个到来即返回。
async fn shutdown_signal(stop: Arc<Notify>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("无法监听SIGINT：{}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("无法监听SIGTERM：{}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("收到SIGINT"),
        _ = terminate => info!("收到SIGTERM"),
        _ = stop.notified() => info!("收到stop指令"),
    }
}
