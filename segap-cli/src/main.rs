//! SEGAp命令行主程序

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use segap_admin::{init_logging, ConfigManager, SegapConfig};
use segap_core::{NewPatient, Sex};
use segap_database::Database;
use segap_segmentation::SegmentationPipeline;
use segap_workflow::{TriageService, UiEvent};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// SEGAp命令行参数
#[derive(Parser, Debug)]
#[command(name = "segap")]
#[command(about = "SEGAp 伤口影像分割与患者档案管理")]
struct Args {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 用户管理
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// 患者管理
    Patient {
        #[command(subcommand)]
        action: PatientAction,
    },
    /// 分割一张伤口照片
    Segment {
        #[command(flatten)]
        login: LoginArgs,
        /// 照片路径 (jpg/jpeg/png)
        #[arg(long)]
        image: PathBuf,
        /// 分配给该DNI的患者
        #[arg(long)]
        assign: Option<String>,
        /// 另存掩膜PNG
        #[arg(long)]
        output: Option<PathBuf>,
        /// 模型文件，覆盖配置
        #[arg(long)]
        model: Option<String>,
    },
    /// 导出患者档案PDF
    Export {
        #[command(flatten)]
        login: LoginArgs,
        #[arg(long)]
        dni: String,
        #[arg(long)]
        output: PathBuf,
    },
    /// 清空患者数据并删除所有掩膜
    Reset {
        #[command(flatten)]
        login: LoginArgs,
        /// 重置密码
        #[arg(long = "reset-password")]
        reset_password: String,
    },
}

#[derive(Subcommand, Debug)]
enum UserAction {
    /// 注册新用户
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
    /// 校验登录
    Login {
        #[command(flatten)]
        login: LoginArgs,
    },
}

#[derive(Subcommand, Debug)]
enum PatientAction {
    /// 登记新患者
    Register {
        #[command(flatten)]
        login: LoginArgs,
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: u8,
        /// Masculino / Femenino / Otro
        #[arg(long)]
        sex: String,
        #[arg(long)]
        dni: String,
    },
    /// 按DNI查找患者
    Find {
        #[command(flatten)]
        login: LoginArgs,
        #[arg(long)]
        dni: String,
    },
}

#[derive(clap::Args, Debug)]
struct LoginArgs {
    /// 用户名
    #[arg(short, long)]
    username: String,
    /// 密码
    #[arg(short, long)]
    password: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let manager = ConfigManager::new(args.config.as_deref())?;
    let mut config = manager.config().clone();
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    // 初始化日志
    init_logging(&config.logging)?;
    info!("数据目录: {}", config.storage.data_dir);

    if let Err(e) = run(args.command, &config).await {
        error!("命令执行失败: {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(command: Command, config: &SegapConfig) -> Result<()> {
    let database = Database::open(&config.database_options()).await?;
    let mut service = TriageService::new(database);

    match command {
        Command::User { action } => match action {
            UserAction::Register {
                username,
                password,
                confirm,
            } => {
                service.navigate(UiEvent::OpenRegister)?;
                service.register_user(&username, &password, &confirm).await?;
                println!("Registrado con éxito: {}", username);
            }
            UserAction::Login { login } => {
                login_with(&mut service, &login).await?;
                println!("Bienvenido {}", login.username);
            }
        },
        Command::Patient { action } => match action {
            PatientAction::Register {
                login,
                name,
                age,
                sex,
                dni,
            } => {
                login_with(&mut service, &login).await?;
                service.navigate(UiEvent::OpenRegisterPatient)?;
                let sex: Sex = sex.parse()?;
                let patient = service
                    .register_patient(NewPatient::new(name, age, sex, dni))
                    .await?;
                println!("Perfil de {} guardado correctamente.", patient.name);
            }
            PatientAction::Find { login, dni } => {
                login_with(&mut service, &login).await?;
                service.navigate(UiEvent::OpenSearchPatient)?;
                let patient = service.find_patient(&dni).await?;
                println!("Nombre: {}", patient.name);
                println!("Edad: {}", patient.age);
                println!("Sexo: {}", patient.sex);
                println!("DNI: {}", patient.dni);
                println!("Segmentaciones: {}", patient.segmentations.len());
                for path in &patient.segmentations {
                    println!("  {}", path);
                }
            }
        },
        Command::Segment {
            login,
            image,
            assign,
            output,
            model,
        } => {
            let model_path = model
                .or_else(|| config.segmentation.model_path.clone())
                .context("No segmentation model configured")?;
            let pipeline = SegmentationPipeline::new(load_model(&model_path, config)?);
            service = service.with_pipeline(pipeline);

            login_with(&mut service, &login).await?;
            service.navigate(UiEvent::OpenSegmentation)?;

            let bytes = tokio::fs::read(&image)
                .await
                .with_context(|| format!("Failed to read {}", image.display()))?;
            let coverage = service.process_image(&bytes)?;
            println!("Cobertura: {:.2}%", coverage);

            if let Some(output) = output {
                if let Some(pending) = service.session().pending() {
                    tokio::fs::write(&output, pending.mask.encode_png()?).await?;
                    println!("Máscara guardada en {}", output.display());
                }
            }
            if let Some(dni) = assign {
                let patient = service.assign_pending(&dni).await?;
                if let Some(path) = patient.segmentations.last() {
                    println!("Segmentación {} asignada a {}", path, patient.dni);
                }
            }
        }
        Command::Export { login, dni, output } => {
            login_with(&mut service, &login).await?;
            service.navigate(UiEvent::OpenSearchPatient)?;
            let pdf = service.export_patient(&dni).await?;
            tokio::fs::write(&output, &pdf).await?;
            println!("PDF exportado a {}", output.display());
        }
        Command::Reset {
            login,
            reset_password,
        } => {
            login_with(&mut service, &login).await?;
            let report = service.reset(&reset_password).await?;
            println!("Base de datos reiniciada: {} archivos eliminados", report.deleted);
            for failure in &report.failures {
                eprintln!("{}", failure);
            }
        }
    }

    Ok(())
}

async fn login_with(service: &mut TriageService, login: &LoginArgs) -> Result<()> {
    service.login(&login.username, &login.password).await?;
    Ok(())
}

#[cfg(feature = "onnx")]
fn load_model(
    model_path: &str,
    config: &SegapConfig,
) -> Result<Arc<dyn segap_segmentation::SegmentationModel>> {
    let model = segap_segmentation::OnnxSegmentationModel::load_with_input_size(
        std::path::Path::new(model_path),
        config.input_size(),
    )?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "onnx"))]
fn load_model(
    model_path: &str,
    _config: &SegapConfig,
) -> Result<Arc<dyn segap_segmentation::SegmentationModel>> {
    anyhow::bail!(
        "cannot load {}: segap was built without the `onnx` feature",
        model_path
    )
}
