/*!
 * Copyright (c) 2026 DocWire Team. All rights reserved.
 *
 * DocWire - MongoDB wire protocol server
 *
 * @file server.rs
 * @brief DocWire TCP server: accept loop and per-connection pipeline
 */

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::logger::ConnectionTracker;
use crate::reply::{ReplyBuffer, ReplyChannel, ReplyMessage};
use crate::request_processor::{RequestContext, RequestProcessor};
use crate::wire_protocol::{IncomingFrame, OutgoingReply, RequestMessage, WireCodec};

pub struct DocWireServer {
    config: ServerConfig,
    processor: RequestProcessor,
    tracker: Arc<ConnectionTracker>,
    shutdown_tx: broadcast::Sender<()>,
}

impl DocWireServer {
    pub fn new(config: ServerConfig, processor: RequestProcessor) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let tracker = Arc::new(ConnectionTracker::new(config.max_connections));

        Self {
            config,
            processor,
            tracker,
            shutdown_tx,
        }
    }

    /// Sending on this stops the accept loop.
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    pub fn connection_tracker(&self) -> Arc<ConnectionTracker> {
        self.tracker.clone()
    }

    pub async fn start(&self) -> Result<()> {
        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr).await?;
        info!("DocWire server listening on {}", addr);
        self.serve(listener).await
    }

    /// Accepts until a shutdown signal arrives. Live connections keep
    /// running on their own tasks.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.accept(stream, peer),
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
                _ = shutdown_rx.recv() => {
                    let open = self.tracker.list_connections();
                    info!("Stopping accept loop with {} open connections", open.len());
                    for connection in open {
                        debug!(
                            connection_id = connection.connection_id,
                            commands = connection.commands_executed,
                            "still serving {} since {}",
                            connection.client_addr,
                            connection.connected_at
                        );
                    }
                    return Ok(());
                }
            }
        }
    }

    fn accept(&self, stream: TcpStream, peer: SocketAddr) {
        let connection_id = match self.tracker.add_connection(peer) {
            Ok(id) => id,
            Err(e) => {
                warn!("Refusing connection from {}: {}", peer, e);
                return;
            }
        };
        info!(connection_id, "New connection from {}", peer);

        let processor = self.processor.clone();
        let tracker = self.tracker.clone();
        let max_message_size = self.config.max_message_size;

        tokio::spawn(async move {
            let connection = Connection {
                id: connection_id,
                peer,
                processor,
                tracker: tracker.clone(),
            };
            let outcome = connection.run(stream, max_message_size).await;
            let commands = tracker
                .get_connection_info(connection_id)
                .map_or(0, |info| info.commands_executed);
            match outcome {
                Ok(()) => info!(connection_id, commands, "Client {} disconnected", peer),
                Err(e) => warn!(connection_id, commands, "Closing connection to {}: {}", peer, e),
            }
            tracker.remove_connection(connection_id);
        });
    }
}

struct Connection {
    id: u64,
    peer: SocketAddr,
    processor: RequestProcessor,
    tracker: Arc<ConnectionTracker>,
}

impl Connection {
    /// Frames are handled strictly one after another. A frame that fails
    /// to decode gets a failure reply; only a broken length prefix ends
    /// the connection.
    async fn run(&self, stream: TcpStream, max_message_size: usize) -> Result<()> {
        let mut framed = Framed::new(stream, WireCodec::new(max_message_size));
        let mut context = RequestContext::new();
        let mut replies = ReplyBuffer::new(Some(self.peer));

        while let Some(frame) = framed.next().await {
            let frame = frame?;
            let request_id = frame.request_id();
            self.tracker.increment_commands(self.id);

            match frame {
                IncomingFrame::Request(message) => self.handle(&message, &mut context, &mut replies).await?,
                IncomingFrame::Rejected { error, .. } => {
                    warn!(connection_id = self.id, request_id, "Dropping undecodable frame: {}", error);
                    replies.send_reply(ReplyMessage::query_failure(&error)).await?;
                }
            }

            for reply in replies.take() {
                framed
                    .send(OutgoingReply {
                        response_to: request_id,
                        reply,
                    })
                    .await?;
            }
        }

        Ok(())
    }

    async fn handle(
        &self,
        message: &RequestMessage,
        context: &mut RequestContext,
        replies: &mut ReplyBuffer,
    ) -> Result<()> {
        let header = *message.header();
        debug!(connection_id = self.id, request_id = header.request_id, op_code = %header.op_code, "request");

        let failure = match self.processor.handle_message(message, context, replies).await {
            Ok(()) => return Ok(()),
            Err(failure) => failure,
        };

        let handled = match self
            .processor
            .handle_error(header.op_code, context, replies, &failure)
            .await
        {
            Ok(handled) => handled,
            Err(e) => {
                error!(connection_id = self.id, "Error handler failed: {}", e);
                false
            }
        };
        if !handled {
            warn!(connection_id = self.id, "Request {} failed: {}", header.request_id, failure);
            replies.send_reply(ReplyMessage::query_failure(&failure)).await?;
        }
        Ok(())
    }
}
