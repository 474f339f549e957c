//! 组件容器演示程序
//!
//! 加载容器设置，注册几组组件，然后演示解析、按名称注入和完整的生命周期。

use anyhow::Result;
use clap::Parser;
use di_abstractions::{
    Characteristic, Constructor, Container, ContainerExt, DescribeComponent, Implementation, Instance, Key,
    MutableContainer, Registration,
};
use infrastructure_common::{BoxError, Disposable, Startable};
use infrastructure_composition::{
    ContainerBootstrapper, ContainerSettings, FnModule, LoggingConfig,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "lifecycle-demo")]
#[command(about = "组件容器生命周期演示")]
struct Args {
    /// 设置文件路径
    #[arg(short, long, default_value = "config/container.toml")]
    config: PathBuf,

    /// 日志级别，覆盖设置文件中的级别
    #[arg(short, long)]
    log_level: Option<tracing::Level>,

    /// 注册完成后立即启动容器
    #[arg(long)]
    auto_start: bool,
}

/// 数据库连接池
struct Database {
    url: String,
    online: AtomicBool,
}

impl Startable for Database {
    fn start(&self) -> Result<(), BoxError> {
        self.online.store(true, Ordering::SeqCst);
        info!("数据库已连接: {}", self.url);
        Ok(())
    }

    fn stop(&self) -> Result<(), BoxError> {
        self.online.store(false, Ordering::SeqCst);
        info!("数据库已断开: {}", self.url);
        Ok(())
    }
}

impl Disposable for Database {
    fn dispose(&self) -> Result<(), BoxError> {
        info!("数据库连接池已释放");
        Ok(())
    }
}

fn database() -> Implementation<Database> {
    Implementation::<Database>::new()
        .constructor(
            Constructor::new("with_url")
                .arg::<String>("database_url")
                .build(|args| {
                    Ok(Database {
                        url: args.next::<String>()?.to_string(),
                        online: AtomicBool::new(false),
                    })
                }),
        )
        .startable()
        .disposable()
}

/// 只通过命名操作参与生命周期的缓存
#[derive(Default)]
struct Cache {
    hits: AtomicUsize,
}

fn cache() -> Implementation<Cache> {
    Implementation::<Cache>::new()
        .default_constructor()
        .operation("open", |_| {
            info!("缓存已预热");
            Ok(())
        })
        .operation("close", |cache| {
            info!("缓存已关闭, 命中 {} 次", cache.hits.load(Ordering::SeqCst));
            Ok(())
        })
}

/// 订单服务，依赖数据库和缓存
struct OrderService {
    database: Arc<Database>,
    cache: Arc<Cache>,
}

impl OrderService {
    fn place(&self, order: &str) -> Result<String, BoxError> {
        if !self.database.online.load(Ordering::SeqCst) {
            return Err("数据库未连接".into());
        }
        self.cache.hits.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{order} 已写入 {}", self.database.url))
    }
}

fn order_service() -> Implementation<OrderService> {
    Implementation::<OrderService>::new().constructor(
        Constructor::new("with_storage")
            .arg::<Database>("database")
            .arg::<Cache>("cache")
            .build(|args| {
                Ok(OrderService {
                    database: args.next::<Database>()?,
                    cache: args.next::<Cache>()?,
                })
            }),
    )
}

/// 报表存储
trait ReportStore: Send + Sync {
    fn location(&self) -> String;
}

struct RegionStore {
    region: &'static str,
}

impl ReportStore for RegionStore {
    fn location(&self) -> String {
        format!("oss://{}/reports", self.region)
    }
}

fn region_store(region: &'static str) -> Implementation<RegionStore> {
    Implementation::<RegionStore>::new()
        .constructor(Constructor::new("in_region").build(move |_| Ok(RegionStore { region })))
        .provides::<dyn ReportStore>(|store| store)
}

/// 报表服务，两个同类型依赖按 setter 名称匹配键
#[derive(Default)]
struct Reporter {
    primary: OnceLock<Arc<dyn ReportStore>>,
    replica: OnceLock<Arc<dyn ReportStore>>,
}

impl Reporter {
    fn targets(&self) -> Vec<String> {
        [&self.primary, &self.replica]
            .into_iter()
            .filter_map(|slot| slot.get().map(|store| store.location()))
            .collect()
    }
}

fn reporter() -> Implementation<Reporter> {
    Implementation::<Reporter>::new()
        .default_constructor()
        .setter::<dyn ReportStore>("set_primary", |reporter, store| {
            let _ = reporter.primary.set(store);
            Ok(())
        })
        .setter::<dyn ReportStore>("set_replica", |reporter, store| {
            let _ = reporter.replica.set(store);
            Ok(())
        })
}

fn load_settings(args: &Args) -> Result<ContainerSettings> {
    let mut settings = if args.config.exists() {
        ContainerSettings::load(&args.config)?
    } else {
        ContainerSettings::from_env()?
    };
    let mut logging = settings
        .logging
        .take()
        .unwrap_or_else(LoggingConfig::development);
    if let Some(level) = args.log_level {
        logging = logging.with_level(level);
    }
    settings.logging = Some(logging);
    if args.auto_start {
        // 容器启动后才解析的组件不会再被启动
        settings.auto_start = true;
        settings.container.instantiate_on_start = true;
    }
    Ok(settings)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = load_settings(&args)?;
    let auto_start = settings.auto_start;

    let container = ContainerBootstrapper::new(settings)
        .with_module(FnModule::new("storage", |container: &dyn MutableContainer| {
            container
                .register(Registration::new(
                    "database_url",
                    Instance::of("postgres://localhost/orders".to_string()),
                ))?
                .register(Registration::new(Key::of::<Database>(), database()))?
                .register(Registration::new(Key::of::<Cache>(), cache()))?;
            Ok(())
        }))
        .with_module(FnModule::new("orders", |container: &dyn MutableContainer| {
            container.register(Registration::new(Key::of::<OrderService>(), order_service()))?;
            Ok(())
        }))
        .with_module(FnModule::new("reports", |container: &dyn MutableContainer| {
            container
                .register(Registration::new("primary", region_store("cn-east")))?
                .register(Registration::new("replica", region_store("cn-north")))?
                .register(
                    Registration::new(Key::of::<Reporter>(), reporter())
                        .with(Characteristic::UseNames),
                )?;
            Ok(())
        }))
        .bootstrap()?;

    info!("容器 {} 构建完成", container.name());

    // 先解析订单服务，使数据库和缓存在启动前已经实例化
    let orders = container
        .get::<OrderService>()?
        .ok_or_else(|| anyhow::anyhow!("订单服务未注册"))?;
    if !auto_start {
        container.start()?;
    }

    match orders.place("订单#1001") {
        Ok(receipt) => info!("{}", receipt),
        Err(e) => warn!("下单失败: {}", e),
    }
    let receipt = container.invoke(&Key::of::<OrderService>(), "place", |service: &OrderService| {
        service.place("订单#1002")
    })?;
    info!("{}", receipt);

    if let Some(reporter) = container.get::<Reporter>()? {
        info!("报表目标: {:?}", reporter.targets());
    }

    let stats = container.stats();
    info!(
        "已注册 {} 个组件, 已实例化 {} 个",
        stats.registered_components, stats.instantiated_components
    );

    container.stop()?;
    container.dispose()?;
    info!("演示结束, 容器状态: {:?}", container.lifecycle_state());
    Ok(())
}
