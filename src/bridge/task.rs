//! Per-request asynchronous transaction state machine
//!
//! One task owns one container transaction from activation to completion.
//! It sequences four independent event sources - container lifecycle
//! callbacks, input readiness, output readiness, and reactive-evaluation
//! completion - by funneling all of them through a single event stream
//! drained by one spawned task, so at most one transition body ever runs
//! at a time and the "single writer" property holds by construction.
//!
//! The phases, each an absorbing step towards the terminal state:
//! reading (buffer the body through non-blocking reads), evaluating (hand
//! the request to the reactive evaluator on the servlet's executor),
//! writing (drain the response body through non-blocking writes). Failures
//! never escape: every path ends with the transaction completed and a
//! counter incremented.

use crate::{
    bridge::{
        evaluator::{Evaluation, Evaluator, Service},
        servlet::Servlet,
    },
    container::{ContainerEvent, TaskListener, Transaction},
    errors::ServiceError,
    http::{
        request::Request,
        response::Response,
        types::{Method, NO_STORE},
    },
    limits::TaskLimits,
    metrics::{TaskMetrics, TaskTimer},
};
use bytes::{Buf, Bytes};
use std::{io, mem, sync::Arc};
use tokio::sync::{mpsc, oneshot::error::RecvError};
use tracing::{debug, error};

pub(crate) struct Task<S: Servlet, T: Transaction> {
    servlet: Arc<S>,
    transaction: T,
    evaluator: Arc<dyn Evaluator>,
    limits: TaskLimits,
    metrics: Arc<TaskMetrics>,
    events: mpsc::UnboundedReceiver<ContainerEvent>,

    // Terminal flag: once set, nothing is observable anymore.
    completed: bool,
    // A response has been started (or finished); guards double responses.
    responded: bool,
    // The evaluator owns the request now; read events are stale.
    executed: bool,

    evaluation: Option<Evaluation>,
    rrequest: Option<Request>,

    // Read phase: growing body accumulator + reusable read buffer.
    data_in: Vec<u8>,
    read_buf: Box<[u8]>,

    // Write phase: remaining body window + reusable chunk buffer.
    data_out: Option<Bytes>,
    write_buf: Box<[u8]>,

    timer: Option<TaskTimer>,
}

// What woke the task up.
enum Turn {
    Event(Option<ContainerEvent>),
    Evaluated(Result<Result<Response, ServiceError>, RecvError>),
}

impl<S: Servlet, T: Transaction> Task<S, T> {
    /// Activates async mode on `transaction` and spawns the state machine
    /// onto the current runtime.
    pub(crate) fn spawn(
        servlet: Arc<S>,
        mut transaction: T,
        evaluator: Arc<dyn Evaluator>,
        limits: TaskLimits,
        metrics: Arc<TaskMetrics>,
    ) {
        let (sender, events) = mpsc::unbounded_channel();
        transaction.set_timeout(limits.timeout);
        transaction.register(TaskListener::new(sender));

        let timer = metrics.task_started();
        let read_buf = vec![0; limits.read_buffer].into_boxed_slice();
        let task = Task {
            servlet,
            transaction,
            evaluator,
            limits,
            metrics,
            events,

            completed: false,
            responded: false,
            executed: false,

            evaluation: None,
            rrequest: None,

            data_in: Vec::new(),
            read_buf,

            data_out: None,
            write_buf: Vec::new().into_boxed_slice(),

            timer: Some(timer),
        };

        tokio::spawn(task.run());
    }

    async fn run(mut self) {
        self.start();

        while !self.completed {
            match self.next_turn().await {
                Turn::Event(Some(event)) => self.on_event(event),
                // The container dropped its listener without completing
                // the transaction; nothing can ever resume us.
                Turn::Event(None) => self.die(),
                Turn::Evaluated(result) => {
                    self.evaluation = None;
                    self.on_evaluated(result);
                }
            }
        }
    }

    async fn next_turn(&mut self) -> Turn {
        match self.evaluation.as_mut() {
            Some(evaluation) => tokio::select! {
                biased;

                event = self.events.recv() => Turn::Event(event),
                result = &mut evaluation.completion => Turn::Evaluated(result),
            },
            None => Turn::Event(self.events.recv().await),
        }
    }

    fn on_event(&mut self, event: ContainerEvent) {
        match event {
            ContainerEvent::DataAvailable | ContainerEvent::AllDataRead => self.continue_reading(),
            ContainerEvent::WritePossible => self.continue_writing(),
            ContainerEvent::Timeout => self.on_timeout(),
            ContainerEvent::Error(error) => {
                debug!(%error, "container reported a transaction error");
                self.die();
            }
        }
    }
}

// Read phase
impl<S: Servlet, T: Transaction> Task<S, T> {
    fn start(&mut self) {
        let raw = self.transaction.request();
        let request = match Request::from_raw(&raw) {
            Ok(request) => request,
            Err(error) => {
                debug!(%error, "request conversion failed");
                self.metrics.container_exception();
                self.die();
                return;
            }
        };

        self.metrics.record_method(Method::from_token(request.method()));
        self.rrequest = Some(request);
        self.continue_reading();
    }

    fn continue_reading(&mut self) {
        if self.completed || self.executed {
            return;
        }

        loop {
            if self.transaction.read_finished() {
                self.execute();
                return;
            }
            if !self.transaction.read_ready() {
                self.metrics.read_wait();
                return;
            }

            let result = self.transaction.read(&mut self.read_buf);
            let Some(count) = self.guard(result) else {
                return;
            };
            // A ready stream may still transfer nothing; the next
            // `read_finished` check terminates the loop then.
            let count = count.unwrap_or(0);
            if count > 0 {
                self.data_in.extend_from_slice(&self.read_buf[..count]);
            }
            self.metrics.record_read(count);
        }
    }

    fn execute(&mut self) {
        let closed = self.transaction.close_input();
        if self.guard(closed).is_none() {
            return;
        }
        let Some(mut request) = self.rrequest.take() else {
            return;
        };

        request.set_data(Bytes::from(mem::take(&mut self.data_in)));
        self.read_buf = Vec::new().into_boxed_slice();
        self.executed = true;

        let request = Arc::new(request);
        let servlet = self.servlet.clone();
        let service: Service = Arc::new(move || servlet.service(&request));
        self.evaluation = Some(self.evaluator.evaluate(service, self.servlet.executor()));
    }
}

// Evaluation outcome
impl<S: Servlet, T: Transaction> Task<S, T> {
    fn on_evaluated(&mut self, result: Result<Result<Response, ServiceError>, RecvError>) {
        match result {
            Ok(Ok(response)) => self.respond(response),
            Ok(Err(error)) => self.fail(&error.to_string()),
            Err(_) => self.fail("evaluation dropped without completing"),
        }
    }

    // Application failure: bare 500, then finish.
    fn fail(&mut self, reason: &str) {
        error!(reason, "service evaluation failed");
        self.metrics.service_exception();

        if !self.responded && !self.completed {
            self.responded = true;
            let status = self.transaction.set_status(500);
            if self.guard(status).is_none() {
                return;
            }
            let header = self.transaction.set_header("Cache-Control", NO_STORE);
            if self.guard(header).is_none() {
                return;
            }
        }
        self.complete();
    }

    fn respond(&mut self, response: Response) {
        if self.responded || self.completed {
            return;
        }
        self.responded = true;

        let status = self.transaction.set_status(response.status());
        if self.guard(status).is_none() {
            return;
        }
        self.metrics.record_status(response.status());

        for (name, value) in response.headers().iter() {
            let header = self.transaction.set_header(name, value);
            if self.guard(header).is_none() {
                return;
            }
        }
        for cookie in response.cookies() {
            let added = self.transaction.add_cookie(cookie);
            if self.guard(added).is_none() {
                return;
            }
        }

        self.data_out = Some(response.data().clone());
        self.continue_writing();
    }
}

// Write phase
impl<S: Servlet, T: Transaction> Task<S, T> {
    fn continue_writing(&mut self) {
        if self.completed {
            return;
        }
        let Some(mut data) = self.data_out.take() else {
            return;
        };

        loop {
            if data.is_empty() {
                self.complete();
                return;
            }
            if !self.transaction.write_ready() {
                self.metrics.write_wait();
                self.data_out = Some(data);
                return;
            }

            if self.write_buf.is_empty() {
                let chunk = self.limits.write_buffer.min(data.len()).max(1);
                self.write_buf = vec![0; chunk].into_boxed_slice();
            }
            let count = self.write_buf.len().min(data.len());
            self.write_buf[..count].copy_from_slice(&data[..count]);

            let result = self.transaction.write(&self.write_buf[..count]);
            if self.guard(result).is_none() {
                return;
            }
            data.advance(count);
            self.metrics.record_write(count);
        }
    }
}

// Termination paths
impl<S: Servlet, T: Transaction> Task<S, T> {
    // Runs the outcome of a container call; on failure the task is torn
    // down through the death path and the caller must return.
    fn guard<V>(&mut self, result: io::Result<V>) -> Option<V> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                debug!(%error, "container call failed");
                self.metrics.container_exception();
                self.die();
                None
            }
        }
    }

    // Container failure: cancel any pending evaluation and finish without
    // attempting a single response byte.
    fn die(&mut self) {
        if self.completed {
            return;
        }
        if let Some(evaluation) = self.evaluation.take() {
            evaluation.cancel();
        }
        self.metrics.async_exception();
        self.complete();
    }

    fn on_timeout(&mut self) {
        if self.completed {
            return;
        }
        self.metrics.timeout_exception();
        // The evaluator is unaware of container events; cancellation is
        // mandatory or its work would leak.
        if let Some(evaluation) = self.evaluation.take() {
            evaluation.cancel();
        }

        if !self.responded {
            self.responded = true;
            let status = self.transaction.set_status(504);
            if self.guard(status).is_none() {
                return;
            }
            let header = self.transaction.set_header("Cache-Control", NO_STORE);
            if self.guard(header).is_none() {
                return;
            }
        }
        self.complete();
    }

    fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        self.data_out = None;

        if let Some(timer) = self.timer.take() {
            self.metrics.task_finished(timer);
        }
        self.transaction.complete();
    }
}
