//! One capture-client session over TCP.
//!
//! The reader task admits frames through the shared governor; a worker thread
//! owns the pipeline; the capability monitor runs on its own thread fed by
//! thermal updates.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, bail, Result};
use futures::stream::SplitStream;
use futures::StreamExt as _;
use tokio::net::TcpStream;
use tokio::sync::mpsc as mpsc_async;
use tracing::{debug, info, warn};

use crate::biomechanics::ExerciseKind;
use crate::capability::{CapabilityMonitor, MonitorEvent, ThermalState};
use crate::config::Config;
use crate::fusion::SensorFusion;
use crate::governor::FrameGovernor;
use crate::pipeline::{FrameInput, Pipeline};
use crate::protocol::{
    decode_message, message_stream, recv_message, send_to_sink, ClientMessage, MessageSink,
    MessageStream, ServerMessage,
};

// 出力キューは結果とモード通知だけなので小さくてよい
const OUT_QUEUE: usize = 16;

/// Serve one client from `Hello` to `EndSession` or hangup. Sends the
/// session summary only when the client ended the session itself.
pub async fn run_session(
    stream: TcpStream,
    config: &Config,
    default_exercise: ExerciseKind,
) -> Result<()> {
    let mut framed = message_stream(stream);

    let (capabilities, exercise) = match recv_message(&mut framed).await? {
        ClientMessage::Hello {
            capabilities,
            exercise,
        } => (capabilities, exercise.unwrap_or(default_exercise)),
        other => bail!("expected Hello, got {:?}", other),
    };
    info!(%exercise, "session started");

    // --- capability monitor ---
    let (thermal_tx, thermal_rx) = mpsc::channel::<ThermalState>();
    let (event_tx, event_rx) = mpsc::channel::<MonitorEvent>();
    let monitor = CapabilityMonitor::new(capabilities).with_events(event_tx);
    let initial_mode = monitor.mode();
    let (mode, monitor_thread) = monitor.spawn(thermal_rx);

    let (out_tx, mut out_rx) = mpsc_async::channel::<ServerMessage>(OUT_QUEUE);

    // モニターのイベントをクライアント向けメッセージへ
    let event_thread = {
        let out_tx = out_tx.clone();
        thread::spawn(move || {
            for event in event_rx.iter() {
                let msg = ServerMessage::ModeChanged {
                    mode: event.mode(),
                    thermal_warning: event.is_thermal_warning(),
                };
                if out_tx.blocking_send(msg).is_err() {
                    break;
                }
            }
        })
    };

    // --- pipeline worker ---
    let governor = Arc::new(FrameGovernor::from_config(&config.governor));
    let pipeline = Pipeline::new(
        exercise,
        mode,
        Arc::clone(&governor),
        SensorFusion::from_config(&config.fusion),
    );
    let (frame_tx, frame_rx) = mpsc::sync_channel::<FrameInput>(1);
    let worker = {
        let out_tx = out_tx.clone();
        thread::spawn(move || {
            let mut pipeline = pipeline;
            for frame in frame_rx.iter() {
                // 順序違いの結果はクライアントにも送らない
                let Some(result) = pipeline.run_admitted(&frame) else {
                    continue;
                };
                if out_tx.blocking_send(ServerMessage::Result { result }).is_err() {
                    debug!("output channel closed");
                }
            }
            pipeline
        })
    };
    drop(out_tx);

    let (mut sink, mut reader) = framed.split();
    send_to_sink(&mut sink, &ServerMessage::Ready { mode: initial_mode }).await?;

    let outcome = reader_loop(&mut reader, &mut sink, &mut out_rx, &governor, &frame_tx, &thermal_tx).await;

    // 後片付け: 入力側を閉じ、残りの結果を流し切ってからサマリーを送る
    drop(frame_tx);
    drop(thermal_tx);
    let mut send_failed = false;
    while let Some(msg) = out_rx.recv().await {
        if !send_failed && send_to_sink(&mut sink, &msg).await.is_err() {
            send_failed = true;
        }
    }
    let pipeline = tokio::task::spawn_blocking(move || {
        let _ = monitor_thread.join();
        let _ = event_thread.join();
        worker.join()
    })
    .await?
    .map_err(|_| anyhow!("pipeline worker panicked"))?;

    let summary = pipeline.finish();
    info!(
        frames = summary.total_frames,
        dropped = governor.dropped_count(),
        over_budget = governor.over_budget_count(),
        "session finished"
    );
    if outcome? && !send_failed {
        send_to_sink(&mut sink, &ServerMessage::Summary { summary }).await?;
    }
    Ok(())
}

/// Returns Ok(true) on `EndSession`, Ok(false) if the client hung up.
async fn reader_loop(
    reader: &mut SplitStream<MessageStream>,
    sink: &mut MessageSink,
    out_rx: &mut mpsc_async::Receiver<ServerMessage>,
    governor: &FrameGovernor,
    frame_tx: &mpsc::SyncSender<FrameInput>,
    thermal_tx: &mpsc::Sender<ThermalState>,
) -> Result<bool> {
    loop {
        tokio::select! {
            result = reader.next() => {
                let bytes = match result {
                    Some(Ok(b)) => b,
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(false),
                };
                let msg: ClientMessage = decode_message(&bytes)?;
                match msg {
                    ClientMessage::Frame { timestamp, joints, depth } => {
                        if !governor.try_admit() {
                            send_to_sink(sink, &ServerMessage::Dropped { timestamp }).await?;
                            continue;
                        }
                        let frame = FrameInput { timestamp, joints, depth };
                        if frame_tx.try_send(frame).is_err() {
                            // ワーカーが止まっている
                            governor.record_completion(0.0);
                            bail!("pipeline worker is gone");
                        }
                    }
                    ClientMessage::Thermal { state } => {
                        let _ = thermal_tx.send(state);
                    }
                    ClientMessage::EndSession => return Ok(true),
                    ClientMessage::Hello { .. } => {
                        warn!("duplicate Hello ignored");
                    }
                }
            }
            Some(out_msg) = out_rx.recv() => {
                send_to_sink(sink, &out_msg).await?;
            }
        }
    }
}
