//! End-to-end lockstep sessions over both transport backends.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sigbridge::{
    BridgeConfig, BridgeError, Device, PortKind, PortTable, QueueTransport, Role, Session,
    SignalBridge, SignalValue, StreamTransport, Transport, run_device,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn counter_table() -> Arc<PortTable> {
    Arc::new(
        PortTable::builder()
            .clock("clock")
            .input("reset", PortKind::Bool)
            .input("enable", PortKind::Bool)
            .output("data_out", PortKind::Uint { width: 4 })
            .build()
            .unwrap(),
    )
}

/// Registered counter: data_out shows the count as of the previous step.
#[derive(Default)]
struct Counter {
    count: u64,
    data_out: u64,
    clk: bool,
    reset: bool,
    enable: bool,
    steps: u64,
}

impl Device for Counter {
    fn step(&mut self) {
        // The orchestrator drives the cycle counter, so the derived clock
        // level must track step parity.
        assert_eq!(self.clk, self.steps % 2 == 1);
        self.data_out = self.count;
        if self.reset {
            self.count = 0;
        } else if self.enable {
            self.count += 1;
        }
        self.steps += 1;
    }

    fn write_input(&mut self, port: &str, value: SignalValue) -> sigbridge::Result<()> {
        match (port, value) {
            ("clock", SignalValue::Bool(b)) => self.clk = b,
            ("reset", SignalValue::Bool(b)) => self.reset = b,
            ("enable", SignalValue::Bool(b)) => self.enable = b,
            _ => return Err(BridgeError::UnknownPort(port.to_string())),
        }
        Ok(())
    }

    fn read_output(&self, port: &str) -> sigbridge::Result<SignalValue> {
        match port {
            "data_out" => Ok(SignalValue::Uint(self.data_out)),
            _ => Err(BridgeError::UnknownPort(port.to_string())),
        }
    }
}

async fn open_stream_pair(
    addr: &str,
    table: Arc<PortTable>,
) -> (
    SignalBridge<StreamTransport>,
    SignalBridge<StreamTransport>,
) {
    let server_cfg = BridgeConfig::new(addr, Role::Server);
    let client_cfg = BridgeConfig::new(addr, Role::Client);
    let (server, client) = tokio::join!(
        SignalBridge::over_stream(&server_cfg, table.clone()),
        async {
            loop {
                match SignalBridge::over_stream(&client_cfg, table.clone()).await {
                    Ok(bridge) => break bridge,
                    Err(BridgeError::Setup { .. }) => {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    }
                    Err(e) => panic!("client open failed: {e}"),
                }
            }
        }
    );
    (server.expect("server open failed"), client)
}

async fn open_queue_pair(
    addr: &str,
    table: Arc<PortTable>,
) -> (SignalBridge<QueueTransport>, SignalBridge<QueueTransport>) {
    let server_cfg = BridgeConfig::new(addr, Role::Server);
    let client_cfg = BridgeConfig::new(addr, Role::Client);
    let (server, client) = tokio::join!(
        SignalBridge::over_queue(&server_cfg, table.clone()),
        async {
            loop {
                match SignalBridge::over_queue(&client_cfg, table.clone()).await {
                    Ok(bridge) => break bridge,
                    Err(BridgeError::Setup { .. }) => {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    }
                    Err(e) => panic!("client open failed: {e}"),
                }
            }
        }
    );
    (server.expect("server open failed"), client)
}

/// Handshake with pid 4242, then three steps: reset on step 0, enable always
/// on. The registered counter must read back 0, 0, 1.
async fn counter_scenario<T>(
    orch: SignalBridge<T>,
    dev: SignalBridge<T>,
    total_steps: u64,
) -> anyhow::Result<u64>
where
    T: Transport + 'static,
{
    let dev_task = tokio::spawn(async move {
        let mut bridge = dev;
        let mut counter = Counter::default();
        run_device(&mut bridge, &mut counter, 4242)
            .await
            .map(|_| counter.steps)
    });

    let mut session = Session::new(orch);
    let pid = session.await_handshake().await?;
    assert_eq!(pid, 4242);
    assert_eq!(session.peer_pid(), Some(4242));

    let mut outputs = Vec::new();
    for step in 0..total_steps {
        session.set("clock", step)?;
        session.set("reset", step == 0)?;
        session.set("enable", true)?;
        session.step().await?;
        outputs.push(session.get::<u64>("data_out")?);
    }

    if total_steps >= 3 {
        assert_eq!(&outputs[..3], &[0u64, 0, 1][..]);
    }
    assert_eq!(session.steps(), total_steps);

    session.shutdown().await?;
    let device_steps = dev_task.await??;
    Ok(device_steps)
}

#[tokio::test]
async fn counter_session_over_stream() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("counter.sock");
    let addr = path.to_str().unwrap();

    let (orch, dev) = open_stream_pair(addr, counter_table()).await;
    let device_steps = counter_scenario(orch, dev, 3).await?;
    assert_eq!(device_steps, 3);

    // Scoped endpoint: the server side unlinks its address on close.
    assert!(!path.exists());
    Ok(())
}

#[tokio::test]
async fn counter_session_over_queue() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("counter.sock");
    let addr = path.to_str().unwrap();

    let (orch, dev) = open_queue_pair(addr, counter_table()).await;
    let device_steps = counter_scenario(orch, dev, 3).await?;
    assert_eq!(device_steps, 3);
    assert!(!path.exists());
    Ok(())
}

#[tokio::test]
async fn terminal_record_on_step_5_stops_both_sides_at_5() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let addr_buf = dir.path().join("early-exit.sock");
    let addr = addr_buf.to_str().unwrap();

    // The run is good for 10 steps; the orchestrator ends it after 5.
    let (orch, dev) = open_stream_pair(addr, counter_table()).await;
    let device_steps = counter_scenario(orch, dev, 5).await?;
    assert_eq!(device_steps, 5);
    Ok(())
}

#[tokio::test]
async fn server_role_binds_before_the_client_connects() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;

    // Same pairing for both backends: the server owns the address.
    let stream_path = dir.path().join("role-stream.sock");
    let stream_addr = stream_path.to_str().unwrap().to_string();
    let server = tokio::spawn({
        let addr = stream_addr.clone();
        async move { StreamTransport::open(&addr, Role::Server).await }
    });
    wait_for_bind(&stream_path).await;
    assert!(stream_path.exists(), "server did not bind the address");
    let client = StreamTransport::open(&stream_addr, Role::Client).await?;
    let server = server.await??;
    drop((server, client));

    let queue_path = dir.path().join("role-queue.sock");
    let queue_addr = queue_path.to_str().unwrap().to_string();
    let server = tokio::spawn({
        let addr = queue_addr.clone();
        async move { QueueTransport::open(&addr, Role::Server).await }
    });
    wait_for_bind(&queue_path).await;
    assert!(queue_path.exists(), "server did not bind the address");
    let client = QueueTransport::open(&queue_addr, Role::Client).await?;
    let server = server.await??;
    drop((server, client));

    Ok(())
}

async fn wait_for_bind(path: &Path) {
    for _ in 0..500 {
        if path.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("no listener appeared at {}", path.display());
}

#[tokio::test]
async fn setup_failures_name_the_failing_operation() {
    init_tracing();
    let err = StreamTransport::open("/nonexistent-dir/nothing-here.sock", Role::Client)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Setup { op: "connect", .. }));

    let err = QueueTransport::open("/nonexistent-dir/nothing-here.sock", Role::Server)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Setup { op: "bind", .. }));
}

#[tokio::test]
async fn oversized_inbound_message_is_a_desync() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("oversized.sock");
    let addr = path.to_str().unwrap().to_string();

    let (server, client) = tokio::join!(QueueTransport::open(&addr, Role::Server), async {
        loop {
            match QueueTransport::open(&addr, Role::Client).await {
                Ok(t) => break t,
                Err(BridgeError::Setup { .. }) => {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                Err(e) => panic!("client open failed: {e}"),
            }
        }
    });
    let mut server = server?;
    let mut client = client;

    // A message the peer's exchange buffer cannot hold must surface as a
    // protocol error, never a truncated read.
    server.send(&[0u8; 64]).await?;
    let mut buf = [0u8; 16];
    let err = client.recv(&mut buf).await.unwrap_err();
    assert!(matches!(err, BridgeError::Desync(_)));
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Send,
    Recv,
}

/// Transport wrapper that records the order of operations on one side.
struct Logged<T> {
    inner: T,
    log: Arc<Mutex<Vec<Op>>>,
}

impl<T> Logged<T> {
    fn new(inner: T) -> (Self, Arc<Mutex<Vec<Op>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                inner,
                log: log.clone(),
            },
            log,
        )
    }
}

#[async_trait]
impl<T: Transport> Transport for Logged<T> {
    async fn send(&mut self, bytes: &[u8]) -> sigbridge::Result<()> {
        self.log.lock().unwrap().push(Op::Send);
        self.inner.send(bytes).await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> sigbridge::Result<usize> {
        let n = self.inner.recv(buf).await?;
        self.log.lock().unwrap().push(Op::Recv);
        Ok(n)
    }

    async fn close(&mut self) -> sigbridge::Result<()> {
        self.inner.close().await
    }
}

fn assert_strict_alternation(ops: &[Op]) {
    for pair in ops.windows(2) {
        assert_ne!(
            pair[0], pair[1],
            "two consecutive {:?} calls without the counterpart in between",
            pair[0]
        );
    }
}

#[tokio::test]
async fn every_exchange_alternates_send_and_recv() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("alternation.sock");
    let addr = path.to_str().unwrap().to_string();

    let (server, client) = tokio::join!(
        StreamTransport::open(&addr, Role::Server),
        async {
            loop {
                match StreamTransport::open(&addr, Role::Client).await {
                    Ok(t) => break t,
                    Err(BridgeError::Setup { .. }) => {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    }
                    Err(e) => panic!("client open failed: {e}"),
                }
            }
        }
    );

    let (orch_transport, orch_log) = Logged::new(server?);
    let (dev_transport, dev_log) = Logged::new(client);

    let table = counter_table();
    let orch = SignalBridge::new(orch_transport, table.clone(), sigbridge::DEFAULT_CAPACITY);
    let dev = SignalBridge::new(dev_transport, table, sigbridge::DEFAULT_CAPACITY);

    counter_scenario(orch, dev, 4).await?;

    let orch_ops = orch_log.lock().unwrap().clone();
    let dev_ops = dev_log.lock().unwrap().clone();

    assert_strict_alternation(&orch_ops);
    assert_strict_alternation(&dev_ops);

    // Orchestrator: handshake recv, N step pairs, terminal send.
    assert_eq!(orch_ops.first(), Some(&Op::Recv));
    assert_eq!(orch_ops.last(), Some(&Op::Send));
    // Device: announce send, N step pairs, then at most one recv of the
    // terminal record and no reply to it.
    assert_eq!(dev_ops.first(), Some(&Op::Send));
    assert_eq!(dev_ops.last(), Some(&Op::Recv));
    // One send and one recv per side per step, plus handshake and terminal.
    assert_eq!(orch_ops.len(), dev_ops.len());
    assert_eq!(orch_ops.len(), 2 * 4 + 2);

    Ok(())
}
