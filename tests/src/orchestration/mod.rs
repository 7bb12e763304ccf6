mod define;
