//! Command-line Modbus RTU master

use std::num::ParseIntError;
use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use rtu_master::*;

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("{0}")]
    BadInt(#[from] ParseIntError),
    #[error("bad character in bit string: {0}")]
    BadCharInBitString(char),
    #[error("hex string must have an even number of characters")]
    OddHexString,
    #[error("{0}")]
    Request(#[from] RequestError),
    #[error("channel was shut down")]
    Shutdown,
    #[error("unable to open serial port")]
    PortUnavailable,
}

impl From<Shutdown> for Error {
    fn from(_: Shutdown) -> Self {
        Self::Shutdown
    }
}

#[derive(Parser)]
#[command(name = "rtu-master-client")]
#[command(about = "A command line program for making Modbus RTU requests using the rtu-master crate")]
#[command(version)]
struct Cli {
    #[arg(long, help = "Path of the serial port (e.g. /dev/ttyUSB0 or COM1)")]
    port: String,

    #[arg(short = 'b', long, default_value_t = 9600, help = "Baud rate of the serial port")]
    baud: u32,

    #[arg(long, value_enum, default_value_t = ParityArg::None, help = "Parity of the serial port")]
    parity: ParityArg,

    #[arg(short = 'i', long, default_value_t = 1, help = "The address of the Modbus server")]
    id: u8,

    #[arg(short = 't', long, default_value_t = 1000, help = "Response timeout in milliseconds")]
    timeout: u64,

    #[arg(short = 'r', long, default_value_t = 3, help = "Number of retries after a timeout")]
    retries: usize,

    #[arg(short = 'p', long, help = "Optional polling period in milliseconds")]
    period: Option<u64>,

    #[arg(long, help = "Log transmitted and received frames")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, ValueEnum)]
enum ParityArg {
    None,
    Odd,
    Even,
}

impl From<ParityArg> for Parity {
    fn from(value: ParityArg) -> Self {
        match value {
            ParityArg::None => Parity::None,
            ParityArg::Odd => Parity::Odd,
            ParityArg::Even => Parity::Even,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(name = "rc", about = "read coils")]
    ReadCoils(ReadArgs),

    #[command(name = "rdi", about = "read discrete inputs")]
    ReadDiscreteInputs(ReadArgs),

    #[command(name = "rhr", about = "read holding registers")]
    ReadHoldingRegisters(ReadArgs),

    #[command(name = "rir", about = "read input registers")]
    ReadInputRegisters(ReadArgs),

    #[command(name = "wsc", about = "write single coil")]
    WriteSingleCoil(WriteSingleCoilArgs),

    #[command(name = "wsr", about = "write single register")]
    WriteSingleRegister(WriteSingleRegisterArgs),

    #[command(name = "wmc", about = "write multiple coils")]
    WriteMultipleCoils(WriteMultipleArgs),

    #[command(name = "wmr", about = "write multiple registers")]
    WriteMultipleRegisters(WriteMultipleArgs),

    #[command(name = "rwmr", about = "write then read multiple holding registers")]
    ReadWriteMultipleRegisters(ReadWriteArgs),

    #[command(name = "raw", about = "send an arbitrary function code and payload")]
    Raw(RawArgs),
}

#[derive(Args)]
struct ReadArgs {
    #[arg(short = 's', long, help = "the starting address")]
    start: u16,

    #[arg(short = 'q', long, help = "quantity of values")]
    quantity: u16,
}

#[derive(Args)]
struct WriteSingleCoilArgs {
    #[arg(short = 'i', long, help = "the address of the coil")]
    index: u16,

    #[arg(short = 'v', long, help = "the value of the coil (true or false)")]
    value: bool,
}

#[derive(Args)]
struct WriteSingleRegisterArgs {
    #[arg(short = 'i', long, help = "the address of the register")]
    index: u16,

    #[arg(short = 'v', long, help = "the value of the register")]
    value: u16,
}

#[derive(Args)]
struct WriteMultipleArgs {
    #[arg(short = 's', long, help = "the starting address")]
    start: u16,

    #[arg(
        short = 'v',
        long,
        help = "coils as a string of 1 and 0 (e.g. 10100011), registers as a comma delimited list (e.g. 1,4,7)"
    )]
    values: String,
}

#[derive(Args)]
struct ReadWriteArgs {
    #[arg(long, help = "the starting address of the registers to read")]
    read_start: u16,

    #[arg(long, help = "quantity of registers to read")]
    read_quantity: u16,

    #[arg(long, help = "the starting address of the registers to write")]
    write_start: u16,

    #[arg(long, help = "the values to write as a comma delimited list (e.g. 1,4,7)")]
    values: String,
}

#[derive(Args)]
struct RawArgs {
    #[arg(short = 'f', long, help = "the function code")]
    function: u8,

    #[arg(short = 'd', long, default_value = "", help = "the payload as a hex string (e.g. 0000000A)")]
    data: String,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    if let Err(ref e) = run().await {
        println!("error: {e}");
    }

    Ok(())
}

async fn run() -> Result<(), Error> {
    let cli = Cli::parse();

    let decode = if cli.verbose {
        DecodeLevel::new(
            AppDecodeLevel::DataValues,
            FrameDecodeLevel::Header,
            PhysDecodeLevel::Nothing,
        )
    } else {
        AppDecodeLevel::DataValues.into()
    };

    let settings = SerialSettings {
        parity: cli.parity.into(),
        ..SerialSettings::with_baud_rate(cli.baud)
    };

    let config = MasterConfig::new()
        .with_response_timeout(Duration::from_millis(cli.timeout))
        .with_number_of_retries(cli.retries);

    let (tx, mut rx) = tokio::sync::mpsc::channel::<MasterEvent>(32);

    let mut channel = spawn_rtu_master(
        &cli.port,
        settings,
        config,
        1,
        default_retry_strategy(),
        decode,
        Some(Box::new(tx)),
    );
    channel.enable().await?;

    'open: loop {
        let event = rx.recv().await.ok_or(Error::Shutdown)?;
        tracing::info!("event: {event:?}");
        match event {
            MasterEvent::PortState(PortState::Open) => break 'open,
            MasterEvent::PortState(PortState::Wait(_)) => return Err(Error::PortUnavailable),
            _ => {}
        }
    }

    let server = ServerAddress::new(cli.id);

    match cli.period {
        None => run_command(&cli.command, &mut channel, server).await,
        Some(period_ms) => {
            let period = Duration::from_millis(period_ms);
            loop {
                if let Err(err) = run_command(&cli.command, &mut channel, server).await {
                    tracing::warn!("error: {err}");
                }
                tokio::time::sleep(period).await
            }
        }
    }
}

async fn run_command(
    command: &Command,
    channel: &mut Channel,
    server: ServerAddress,
) -> Result<(), Error> {
    match command {
        Command::ReadCoils(args) => {
            let unit = DataUnit::new(RegisterType::Coils, args.start, args.quantity);
            print_bits(&channel.read(unit, server).await?);
        }
        Command::ReadDiscreteInputs(args) => {
            let unit = DataUnit::new(RegisterType::DiscreteInputs, args.start, args.quantity);
            print_bits(&channel.read(unit, server).await?);
        }
        Command::ReadHoldingRegisters(args) => {
            let unit = DataUnit::new(RegisterType::HoldingRegisters, args.start, args.quantity);
            print_registers(&channel.read(unit, server).await?);
        }
        Command::ReadInputRegisters(args) => {
            let unit = DataUnit::new(RegisterType::InputRegisters, args.start, args.quantity);
            print_registers(&channel.read(unit, server).await?);
        }
        Command::WriteSingleCoil(args) => {
            let unit = DataUnit::coils(args.index, &[args.value]);
            channel.write(unit, server).await?;
        }
        Command::WriteSingleRegister(args) => {
            let unit = DataUnit::holding_registers(args.index, &[args.value]);
            channel.write(unit, server).await?;
        }
        Command::WriteMultipleCoils(args) => {
            let unit = DataUnit::coils(args.start, &parse_bit_values(&args.values)?);
            channel.write(unit, server).await?;
        }
        Command::WriteMultipleRegisters(args) => {
            let unit = DataUnit::holding_registers(args.start, &parse_register_values(&args.values)?);
            channel.write(unit, server).await?;
        }
        Command::ReadWriteMultipleRegisters(args) => {
            let read = DataUnit::new(
                RegisterType::HoldingRegisters,
                args.read_start,
                args.read_quantity,
            );
            let write =
                DataUnit::holding_registers(args.write_start, &parse_register_values(&args.values)?);
            let response = channel
                .send_read_write_request(read, write, server)
                .await?
                .await?;
            if let Some(unit) = response.unit() {
                print_registers(unit);
            }
        }
        Command::Raw(args) => {
            let pdu = Pdu::from_raw(args.function, parse_hex(&args.data)?);
            let response = channel.send_raw_request(pdu, server).await?.await?;
            println!("{}", response.pdu());
        }
    }
    Ok(())
}

fn print_bits(unit: &DataUnit) {
    for x in unit.iter() {
        println!("index: {} value: {}", x.index, x.value != 0)
    }
}

fn print_registers(unit: &DataUnit) {
    for x in unit.iter() {
        println!("index: {} value: {}", x.index, x.value)
    }
}

fn parse_bit_values(values_str: &str) -> Result<Vec<bool>, Error> {
    let mut values: Vec<bool> = Vec::new();
    for c in values_str.chars().rev() {
        match c {
            '0' => values.push(false),
            '1' => values.push(true),
            _ => return Err(Error::BadCharInBitString(c)),
        }
    }
    Ok(values)
}

fn parse_register_values(values_str: &str) -> Result<Vec<u16>, ParseIntError> {
    let mut values: Vec<u16> = Vec::new();
    for value in values_str.split(',') {
        values.push(u16::from_str(value.trim())?);
    }
    Ok(values)
}

fn parse_hex(hex: &str) -> Result<Vec<u8>, Error> {
    if hex.len() % 2 != 0 {
        return Err(Error::OddHexString);
    }
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for i in (0..hex.len()).step_by(2) {
        let pair = hex.get(i..i + 2).ok_or(Error::OddHexString)?;
        bytes.push(u8::from_str_radix(pair, 16)?);
    }
    Ok(bytes)
}
