//! Scripted mock controller for engine and manager tests
//!
//! Records every control and data access as an [`Op`] so tests can assert
//! the exact order a transaction drove the hardware in. Behind the data
//! register sits a simulated register device: a write transaction's first
//! byte sets the register pointer, further bytes store through it, and
//! reads stream from wherever the pointer points, auto-incrementing.

use core::cell::RefCell;

use crate::error::BusFault;
use crate::latch::FaultLatch;
use crate::periph::{FaultFlags, I2cPeriph};
use crate::timing::BusTiming;

/// One recorded hardware access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    PowerOn,
    PowerOff,
    ApplyTiming(u32),
    SoftwareReset,
    Start,
    WriteAddress(u8),
    ClearAddr,
    Ack(bool),
    Pos(bool),
    StopRx,
    StopTx,
    Read(u8),
    Write(u8),
}

struct FaultInjection<'a> {
    latch: &'a FaultLatch,
    fault: BusFault,
    polls_before: u32,
}

struct MockState<'a> {
    ops: Vec<Op>,
    regs: [u8; 256],
    pointer: u8,
    expect_pointer: bool,
    timing: Option<BusTiming>,
    busy_polls: u32,
    start_never_sent: bool,
    stop_polls: u32,
    fault_flags: FaultFlags,
    injection: Option<FaultInjection<'a>>,
}

pub struct MockPeriph<'a> {
    clock_hz: u32,
    state: RefCell<MockState<'a>>,
}

impl<'a> MockPeriph<'a> {
    pub fn new(clock_hz: u32) -> Self {
        MockPeriph {
            clock_hz,
            state: RefCell::new(MockState {
                ops: Vec::new(),
                regs: [0; 256],
                pointer: 0,
                expect_pointer: false,
                timing: None,
                busy_polls: 0,
                start_never_sent: false,
                stop_polls: 0,
                fault_flags: FaultFlags::default(),
                injection: None,
            }),
        }
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state.borrow().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.state.borrow_mut().ops.clear();
    }

    pub fn fill_registers_with_identity(&self) {
        let mut state = self.state.borrow_mut();
        for (i, reg) in state.regs.iter_mut().enumerate() {
            *reg = i as u8;
        }
        state.pointer = 0;
    }

    pub fn register(&self, index: u8) -> u8 {
        self.state.borrow().regs[index as usize]
    }

    /// Keep the busy flag up for the next `polls` samples.
    pub fn set_busy_polls(&self, polls: u32) {
        self.state.borrow_mut().busy_polls = polls;
    }

    /// Never report the start condition as sent.
    pub fn set_start_never_sent(&self, never: bool) {
        self.state.borrow_mut().start_never_sent = never;
    }

    /// Script the error status the next interrupt sampling sees.
    pub fn set_fault_flags(&self, flags: FaultFlags) {
        self.state.borrow_mut().fault_flags = flags;
    }

    /// Hold the address-acknowledge flag down and, after `polls_before`
    /// samples, raise `fault` on `latch` the way the error interrupt
    /// would.
    pub fn inject_fault(&self, latch: &'a FaultLatch, fault: BusFault, polls_before: u32) {
        self.state.borrow_mut().injection = Some(FaultInjection {
            latch,
            fault,
            polls_before,
        });
    }

    fn record(&self, op: Op) {
        self.state.borrow_mut().ops.push(op);
    }
}

impl I2cPeriph for MockPeriph<'_> {
    fn input_clock_hz(&self) -> u32 {
        self.clock_hz
    }

    fn power_on(&self) {
        self.record(Op::PowerOn);
    }

    fn power_off(&self) {
        self.record(Op::PowerOff);
    }

    fn apply_timing(&self, timing: BusTiming) {
        let mut state = self.state.borrow_mut();
        state.timing = Some(timing);
        state.ops.push(Op::ApplyTiming(timing.raw()));
    }

    fn current_timing(&self) -> BusTiming {
        self.state
            .borrow()
            .timing
            .unwrap_or(BusTiming::from_raw(0))
    }

    fn software_reset(&self) {
        self.record(Op::SoftwareReset);
    }

    fn bus_busy(&self) -> bool {
        let mut state = self.state.borrow_mut();
        if state.busy_polls > 0 {
            state.busy_polls -= 1;
            true
        } else {
            false
        }
    }

    fn send_start(&self) {
        self.record(Op::Start);
    }

    fn start_sent(&self) -> bool {
        !self.state.borrow().start_never_sent
    }

    fn write_address(&self, header: u8) {
        let mut state = self.state.borrow_mut();
        // A write transaction re-arms the register-pointer protocol; a
        // read streams from wherever the pointer was left.
        if header & 1 == 0 {
            state.expect_pointer = true;
        }
        state.ops.push(Op::WriteAddress(header));
    }

    fn address_acked(&self) -> bool {
        let mut state = self.state.borrow_mut();
        match &mut state.injection {
            Some(injection) => {
                if injection.polls_before == 0 {
                    injection.latch.raise(injection.fault);
                } else {
                    injection.polls_before -= 1;
                }
                false
            }
            None => true,
        }
    }

    fn clear_address_flag(&self) {
        self.record(Op::ClearAddr);
    }

    fn set_ack(&self, enable: bool) {
        self.record(Op::Ack(enable));
    }

    fn set_position_next(&self, enable: bool) {
        self.record(Op::Pos(enable));
    }

    fn send_stop_rx(&self) {
        let mut state = self.state.borrow_mut();
        state.stop_polls = 1;
        state.ops.push(Op::StopRx);
    }

    fn stop_pending(&self) -> bool {
        let mut state = self.state.borrow_mut();
        if state.stop_polls > 0 {
            state.stop_polls -= 1;
            true
        } else {
            false
        }
    }

    fn rx_ready(&self) -> bool {
        true
    }

    fn read_data(&self) -> u8 {
        let mut state = self.state.borrow_mut();
        let byte = state.regs[state.pointer as usize];
        state.pointer = state.pointer.wrapping_add(1);
        state.ops.push(Op::Read(byte));
        byte
    }

    fn write_data(&self, byte: u8) {
        let mut state = self.state.borrow_mut();
        if state.expect_pointer {
            state.pointer = byte;
            state.expect_pointer = false;
        } else {
            let pointer = state.pointer;
            state.regs[pointer as usize] = byte;
            state.pointer = pointer.wrapping_add(1);
        }
        state.ops.push(Op::Write(byte));
    }

    fn tx_empty(&self) -> bool {
        true
    }

    fn byte_transfer_finished(&self) -> bool {
        true
    }

    fn transfer_complete(&self) -> bool {
        true
    }

    fn send_stop_tx(&self) {
        let mut state = self.state.borrow_mut();
        state.stop_polls = 1;
        state.ops.push(Op::StopTx);
    }

    fn take_fault_flags(&self) -> FaultFlags {
        let mut state = self.state.borrow_mut();
        core::mem::take(&mut state.fault_flags)
    }
}
