extern crate sdl2;

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use chip8vm::chip8::{DISPLAY_HEIGHT, DISPLAY_SIZE, DISPLAY_WIDTH};
use chip8vm::host::{self, Clock, OFF_COLOR, ON_COLOR};
use chip8vm::Chip8;
use clap::Parser;
use sdl2::event::Event;
use sdl2::gfx::primitives::DrawRenderer;
use sdl2::keyboard::Keycode;
use sdl2::pixels;
use sdl2::render::Canvas;
use sdl2::video::Window;

#[derive(Parser, Debug)]
#[command(version, about = "Run a CHIP-8 program", long_about = None)]
struct Args {
    /// Instruction cycles per second
    #[arg(value_parser = host::parse_frequency)]
    frequency: f64,

    /// Raw program binary, loaded at 0x200
    program: PathBuf,

    /// Window pixels per CHIP-8 pixel
    #[arg(short, long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..=32))]
    scale: u32,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    log::info!("loading {}", args.program.display());
    let program = fs::read(&args.program)
        .with_context(|| format!("reading {}", args.program.display()))?;
    log::info!("program size: {} bytes", program.len());

    let mut emu = Chip8::new();
    emu.load_program(&program)?;

    log::info!("frequency: {:.2} Hz", args.frequency);
    log::info!("press Escape to quit");

    let sdl_ctx = sdl2::init().map_err(anyhow::Error::msg)?;
    let video = sdl_ctx.video().map_err(anyhow::Error::msg)?;

    let window = video
        .window(
            "CHIP-8",
            DISPLAY_WIDTH as u32 * args.scale,
            DISPLAY_HEIGHT as u32 * args.scale,
        )
        .position_centered()
        .build()?;
    let mut canvas = window.into_canvas().build()?;

    let (r, g, b) = OFF_COLOR;
    let off = pixels::Color::RGB(r, g, b);
    let (r, g, b) = ON_COLOR;
    let on = pixels::Color::RGB(r, g, b);
    canvas.set_draw_color(off);
    canvas.clear();
    canvas.present();

    let mut event_pump = sdl_ctx.event_pump().map_err(anyhow::Error::msg)?;

    let mut clock = Clock::new(args.frequency, Instant::now());
    let sleep = Duration::from_millis(1);

    'main: loop {
        for e in event_pump.poll_iter() {
            match e {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'main,
                Event::KeyDown {
                    keycode: Some(keycode),
                    ..
                } => set_key(&mut emu, keycode, true),
                Event::KeyUp {
                    keycode: Some(keycode),
                    ..
                } => set_key(&mut emu, keycode, false),
                _ => {}
            }
        }

        let ticks = clock.advance(Instant::now());

        let mut draw = false;
        for _ in 0..ticks.cycles {
            if let Err(e) = emu.cycle() {
                log::warn!("{}", e);
            }
            draw |= emu.should_draw();
        }

        for _ in 0..ticks.timers {
            emu.update_timers();
        }

        if draw {
            render(&mut canvas, emu.display(), args.scale, on, off)?;
        }

        std::thread::sleep(sleep);
    }

    Ok(())
}

fn set_key(emu: &mut Chip8, keycode: Keycode, pressed: bool) {
    // only single character key names can be keypad keys
    let name = keycode.name();
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if let Some(index) = host::keypad_index(c) {
            emu.set_key(index, pressed);
        }
    }
}

fn render(
    canvas: &mut Canvas<Window>,
    gfx: &[u8; DISPLAY_SIZE],
    scale: u32,
    on: pixels::Color,
    off: pixels::Color,
) -> anyhow::Result<()> {
    canvas.set_draw_color(off);
    canvas.clear();

    let scale = scale as i16;
    let width = DISPLAY_WIDTH as i16;
    for (i, p) in gfx.iter().enumerate() {
        if *p == 0 {
            continue;
        }
        let i = i as i16;
        let x = (i % width) * scale;
        let y = (i / width) * scale;
        canvas
            .box_(x, y, x + scale - 1, y + scale - 1, on)
            .map_err(anyhow::Error::msg)?;
    }

    canvas.present();
    Ok(())
}
