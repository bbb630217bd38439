use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

mod error;
mod opcode;

pub use error::Error;
pub use opcode::Opcode;

pub const MEMORY_SIZE: usize = 4096;
pub const PROGRAM_START: u16 = 0x200; // programs start at 0x200
pub const MAX_PROGRAM_SIZE: usize = 0x0E00;
pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;
pub const DISPLAY_SIZE: usize = DISPLAY_WIDTH * DISPLAY_HEIGHT;
pub const KEY_COUNT: usize = 16;

const STACK_DEPTH: usize = 16;
const ADDRESS_MASK: u16 = 0xFFF; // pc stays within the 4K address space
const GLYPH_SIZE: u16 = 5;

const FONTSET: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

type OpcodeFn = fn(&mut Chip8) -> Result<(), Error>;

/// The CHIP-8 virtual machine.
///
/// The host drives it with two independent ticks: `cycle` at the configured
/// instruction rate and `update_timers` at 60Hz. All calls must come from a
/// single owner; there is no internal synchronization.
pub struct Chip8 {
    // CHIP-8 VM
    opcode: Opcode,            // current opcode
    memory: [u8; MEMORY_SIZE], // system memory
    v: [u8; 16],               // registers V0-VE (VF is flag for some instructions)
    i: u16,                    // address register
    pc: u16,                   // program counter
    gfx: [u8; DISPLAY_SIZE],   // pixels state
    delay_timer: u8,
    sound_timer: u8, // timers count down at 60Hz
    stack: [u16; STACK_DEPTH],
    sp: usize,              // stack pointer
    key: [bool; KEY_COUNT], // hex keypad state

    // emulator resources
    draw_flag: bool,
    awaiting_key: Option<usize>, // register waiting on FX0A
    seed: Option<u64>,
    rng: StdRng,
}

impl Chip8 {
    const OPCODE_FNS: [OpcodeFn; 16] = [
        Self::sys,     // 0***
        Self::jmp,     // 1NNN
        Self::call,    // 2NNN
        Self::eb,      // 3XNN
        Self::neb,     // 4XNN
        Self::er,      // 5XY0
        Self::ld,      // 6XNN
        Self::addb,    // 7XNN
        Self::alu,     // 8XY*
        Self::ner,     // 9XY0
        Self::si,      // ANNN
        Self::jmpo,    // BNNN
        Self::rng,     // CXNN
        Self::draw,    // DXYN
        Self::key,     // EX**
        Self::ex,      // FX**
    ];

    /// A machine whose random source is seeded from OS entropy.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A machine whose CXNN results are reproducible across resets.
    pub fn with_seed(seed: u64) -> Self {
        Self::build(Some(seed))
    }

    fn build(seed: Option<u64>) -> Self {
        let mut chip8 = Self {
            opcode: Opcode::default(),
            memory: [0; MEMORY_SIZE],
            v: [0; 16],
            i: 0,
            pc: PROGRAM_START,
            gfx: [0; DISPLAY_SIZE],
            delay_timer: 0,
            sound_timer: 0,
            stack: [0; STACK_DEPTH],
            sp: 0,
            key: [false; KEY_COUNT],

            draw_flag: false,
            awaiting_key: None,
            seed,
            rng: Self::seed_rng(seed),
        };
        chip8.reset();
        chip8
    }

    fn seed_rng(seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Zero every part of the machine, reload the font and re-seed the
    /// random source.
    pub fn reset(&mut self) {
        self.memory = [0; MEMORY_SIZE];
        // CHIP-8 systems had the interpreter in the first 512 bytes of memory
        // since we're emulating that we can just store the fontset there
        self.memory[..FONTSET.len()].copy_from_slice(&FONTSET);

        self.opcode = Opcode::default();
        self.v = [0; 16];
        self.i = 0;
        self.pc = PROGRAM_START;
        self.gfx = [0; DISPLAY_SIZE];
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.stack = [0; STACK_DEPTH];
        self.sp = 0;
        self.key = [false; KEY_COUNT];
        self.draw_flag = false;
        self.awaiting_key = None;
        self.rng = Self::seed_rng(self.seed);

        log::debug!("machine reset");
    }

    /// Reset the machine and copy `program` into memory at 0x200.
    ///
    /// A program larger than `MAX_PROGRAM_SIZE` is rejected before anything
    /// is touched.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), Error> {
        if program.len() > MAX_PROGRAM_SIZE {
            return Err(Error::ProgramTooLarge {
                size: program.len(),
                max: MAX_PROGRAM_SIZE,
            });
        }

        self.reset();
        let start = PROGRAM_START as usize;
        self.memory[start..start + program.len()].copy_from_slice(program);

        log::debug!("loaded {} byte program at {:#05X}", program.len(), start);
        Ok(())
    }

    pub fn should_draw(&self) -> bool {
        self.draw_flag
    }

    /// Row-major 64x32 pixels, 0 is off.
    pub fn display(&self) -> &[u8; DISPLAY_SIZE] {
        &self.gfx
    }

    pub fn sound_flag(&self) -> bool {
        self.sound_timer > 0
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn index(&self) -> u16 {
        self.i
    }

    pub fn register(&self, x: usize) -> Option<u8> {
        self.v.get(x).copied()
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    /// Register that will receive the next key press, while FX0A is blocking.
    pub fn awaiting_key(&self) -> Option<usize> {
        self.awaiting_key
    }

    pub fn set_key(&mut self, index: usize, pressed: bool) {
        match self.key.get_mut(index) {
            Some(key) => *key = pressed,
            None => log::warn!("ignoring keypad index {} out of range", index),
        }
    }

    /// Count both timers down by one, stopping at zero.
    pub fn update_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// Execute one instruction.
    ///
    /// An `Err` is diagnostic only: the offending instruction has been
    /// skipped and the machine can keep cycling.
    pub fn cycle(&mut self) -> Result<(), Error> {
        self.draw_flag = false;

        if let Some(x) = self.awaiting_key {
            self.poll_key(x);
            return Ok(());
        }

        // two-byte opcodes
        let pc = self.pc as usize;
        self.opcode = Opcode::from_bytes(
            self.memory[pc % MEMORY_SIZE],
            self.memory[(pc + 1) % MEMORY_SIZE],
        );

        log::trace!("{:03X}: {}", self.pc, self.opcode);

        let f = Self::OPCODE_FNS[self.opcode.family()];
        f(self)
    }

    fn jump_to(&mut self, addr: u16) {
        self.pc = addr & ADDRESS_MASK;
    }

    fn advance(&mut self) {
        self.jump_to(self.pc + 2);
    }

    fn skip_if(&mut self, cond: bool) {
        self.jump_to(self.pc + if cond { 4 } else { 2 });
    }

    /// Skip the current instruction and hand back `err` for the host.
    fn fault(&mut self, err: Error) -> Error {
        self.advance();
        err
    }

    fn invalid(&mut self) -> Error {
        let err = Error::InvalidOpcode {
            opcode: self.opcode,
            pc: self.pc,
        };
        self.fault(err)
    }

    fn mem(&self, addr: usize) -> u8 {
        self.memory[addr % MEMORY_SIZE]
    }

    /// Write an ALU result, then its flag, so VF holds the flag even when X is F.
    fn set_with_flag(&mut self, x: usize, value: u8, flag: bool) {
        self.v[x] = value;
        self.v[0xF] = flag as u8;
    }

    fn poll_key(&mut self, x: usize) {
        if let Some(pressed) = self.key.iter().rposition(|&down| down) {
            self.v[x] = pressed as u8;
            self.awaiting_key = None;
            self.advance();
        }
    }

    fn sys(&mut self) -> Result<(), Error> {
        match self.opcode.0 {
            0x00E0 => {
                // 00E0
                // clear screen
                self.gfx = [0; DISPLAY_SIZE];
                self.draw_flag = true;
                self.advance();
            }
            0x00EE => {
                // 00EE
                // return from subroutine
                if self.sp == 0 {
                    let pc = self.pc;
                    return Err(self.fault(Error::StackUnderflow { pc }));
                }
                self.sp -= 1;
                let ret = self.stack[self.sp];
                self.stack[self.sp] = 0;
                self.jump_to(ret + 2);
            }
            _ => {
                // 0NNN
                // machine code routine on the COSMAC VIP, nothing to run here
                log::debug!("ignoring machine code call {}", self.opcode);
                self.advance();
            }
        }
        Ok(())
    }

    fn jmp(&mut self) -> Result<(), Error> {
        // 1NNN
        // jump to NNN
        self.jump_to(self.opcode.nnn());
        Ok(())
    }

    fn call(&mut self) -> Result<(), Error> {
        // 2NNN
        // call subroutine at NNN
        if self.sp == STACK_DEPTH {
            let pc = self.pc;
            return Err(self.fault(Error::StackOverflow { pc }));
        }
        self.stack[self.sp] = self.pc;
        self.sp += 1;
        self.jump_to(self.opcode.nnn());
        Ok(())
    }

    fn eb(&mut self) -> Result<(), Error> {
        // 3XNN
        // skip if VX == NN
        self.skip_if(self.v[self.opcode.x()] == self.opcode.nn());
        Ok(())
    }

    fn neb(&mut self) -> Result<(), Error> {
        // 4XNN
        // skip if VX != NN
        self.skip_if(self.v[self.opcode.x()] != self.opcode.nn());
        Ok(())
    }

    fn er(&mut self) -> Result<(), Error> {
        // 5XY0
        // skip if VX == VY
        self.skip_if(self.v[self.opcode.x()] == self.v[self.opcode.y()]);
        Ok(())
    }

    fn ld(&mut self) -> Result<(), Error> {
        // 6XNN
        // set VX to NN
        self.v[self.opcode.x()] = self.opcode.nn();
        self.advance();
        Ok(())
    }

    fn addb(&mut self) -> Result<(), Error> {
        // 7XNN
        // add NN to VX (no carry)
        let x = self.opcode.x();
        self.v[x] = self.v[x].wrapping_add(self.opcode.nn());
        self.advance();
        Ok(())
    }

    fn alu(&mut self) -> Result<(), Error> {
        let x = self.opcode.x();
        let vx = self.v[x];
        let vy = self.v[self.opcode.y()];
        match self.opcode.n() {
            // 8XY0
            0x0 => self.v[x] = vy,
            // 8XY1
            0x1 => self.v[x] = vx | vy,
            // 8XY2
            0x2 => self.v[x] = vx & vy,
            // 8XY3
            0x3 => self.v[x] = vx ^ vy,
            0x4 => {
                // 8XY4
                // add VY to VX (set VF = 1 if there's a carry)
                let (sum, carry) = vx.overflowing_add(vy);
                self.set_with_flag(x, sum, carry);
            }
            // 8XY5
            // sub VY from VX (set VF = 1 only if VX > VY)
            0x5 => self.set_with_flag(x, vx.wrapping_sub(vy), vx > vy),
            // 8XY6
            // store the LSB of VX in VF and shift VX one to the right
            0x6 => self.set_with_flag(x, vx >> 1, vx & 0x1 == 0x1),
            // 8XY7
            // set VX to VY - VX (set VF = 1 only if VY > VX)
            0x7 => self.set_with_flag(x, vy.wrapping_sub(vx), vy > vx),
            // 8XYE
            // store the MSB of VX in VF and shift VX one to the left
            0xE => self.set_with_flag(x, vx << 1, vx & 0x80 == 0x80),
            _ => return Err(self.invalid()),
        }
        self.advance();
        Ok(())
    }

    fn ner(&mut self) -> Result<(), Error> {
        // 9XY0
        // skip if VX != VY
        self.skip_if(self.v[self.opcode.x()] != self.v[self.opcode.y()]);
        Ok(())
    }

    fn si(&mut self) -> Result<(), Error> {
        // ANNN
        // set I to NNN
        self.i = self.opcode.nnn();
        self.advance();
        Ok(())
    }

    fn jmpo(&mut self) -> Result<(), Error> {
        // BNNN
        // jump to NNN + V0
        self.jump_to(self.opcode.nnn() + self.v[0] as u16);
        Ok(())
    }

    fn rng(&mut self) -> Result<(), Error> {
        // CXNN
        // Set VX = RNG[0, 256) & NN
        let byte: u8 = self.rng.gen();
        self.v[self.opcode.x()] = byte & self.opcode.nn();
        self.advance();
        Ok(())
    }

    fn draw(&mut self) -> Result<(), Error> {
        // DXYN
        // draw a sprite at VX,VY with a width of 8 pixels and a height of N pixels
        // each row of 8 pixels is bit-coded in memory starting at I
        // currently drawn pixels are XORd with pixels in memory
        // VF is set to 1 if any currently drawn pixels are unset during this
        // anything past the right or bottom edge is clipped
        let vx = self.v[self.opcode.x()] as usize;
        let vy = self.v[self.opcode.y()] as usize;
        let height = self.opcode.n() as usize;
        let i = self.i as usize;

        let mut erased = false;
        for row in 0..height {
            let py = vy + row;
            if py >= DISPLAY_HEIGHT {
                break;
            }
            let pixel = self.mem(i + row); // load sprite starting at I
            for p in 0..8 {
                let px = vx + p;
                if px >= DISPLAY_WIDTH {
                    break;
                }
                if pixel & (0x80 >> p) != 0 {
                    let gfx_offset = DISPLAY_WIDTH * py + px;
                    self.gfx[gfx_offset] = if self.gfx[gfx_offset] != 0 {
                        // screen pixel is set and being unset
                        erased = true;
                        0
                    } else {
                        1
                    };
                }
            }
        }

        self.v[0xF] = erased as u8;
        self.draw_flag = true;
        self.advance();
        Ok(())
    }

    fn key(&mut self) -> Result<(), Error> {
        let vx = self.v[self.opcode.x()] as usize;
        let pressed = self.key.get(vx).copied().unwrap_or(false);
        match self.opcode.nn() {
            // EX9E
            // skip if key stored in VX is pressed
            0x9E => self.skip_if(pressed),
            // EXA1
            // skip if key stored in VX isn't pressed
            0xA1 => self.skip_if(!pressed),
            _ => return Err(self.invalid()),
        }
        Ok(())
    }

    fn ex(&mut self) -> Result<(), Error> {
        let x = self.opcode.x();
        let vx = self.v[x];
        let i = self.i as usize;
        match self.opcode.nn() {
            // FX07
            0x07 => self.v[x] = self.delay_timer,
            0x0A => {
                // FX0A
                // store next key press in VX, blocking until one arrives
                self.awaiting_key = Some(x);
                self.poll_key(x);
                return Ok(());
            }
            // FX15
            0x15 => self.delay_timer = vx,
            // FX18
            0x18 => self.sound_timer = vx,
            0x1E => {
                // FX1E
                // add VX to I, VF flags a result past the address space
                let sum = self.i as u32 + vx as u32;
                self.i = sum as u16;
                self.v[0xF] = (sum > 0xFFF) as u8;
            }
            // FX29
            // fontset lives in the first 80 bytes, 5 bytes per glyph
            0x29 => self.i = vx as u16 * GLYPH_SIZE,
            0x33 => {
                // FX33
                // store the BCD representation of VX at I
                // so 193 becomes [1, 9, 3] in memory at I
                self.memory[i % MEMORY_SIZE] = vx / 100;
                self.memory[(i + 1) % MEMORY_SIZE] = (vx / 10) % 10;
                self.memory[(i + 2) % MEMORY_SIZE] = vx % 10;
            }
            0x55 => {
                // FX55
                // store V0 to VX (inclusive) in memory at I
                for offset in 0..=x {
                    self.memory[(i + offset) % MEMORY_SIZE] = self.v[offset];
                }
                self.i = self.i.wrapping_add(x as u16 + 1);
            }
            0x65 => {
                // FX65
                // fill V0 to VX (inclusive) from memory at I
                for offset in 0..=x {
                    self.v[offset] = self.mem(i + offset);
                }
                self.i = self.i.wrapping_add(x as u16 + 1);
            }
            _ => return Err(self.invalid()),
        }
        self.advance();
        Ok(())
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}
